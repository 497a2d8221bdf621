/// Contacts API server binary
use contacts_api::{config::LoggingConfig, server, ApiResult, AppContext, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("contacts_api={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging);
    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ____            _             _
  / ___|___  _ __ | |_ __ _  ___| |_ ___
 | |   / _ \| '_ \| __/ _` |/ __| __/ __|
 | |__| (_) | | | | || (_| | (__| |_\__ \
  \____\___/|_| |_|\__\__,_|\___|\__|___/

        Contacts API v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
