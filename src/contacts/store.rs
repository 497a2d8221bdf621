/// Owner-scoped contact persistence
///
/// Every query filters on `user_id`, so a contact owned by someone else is
/// indistinguishable from one that does not exist.
use super::{birthdays, ContactFields};
use crate::db::contact::Contact;
use crate::error::{ApiError, ApiResult};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

const DUPLICATE_EMAIL: &str = "Contact with this email already exists";

/// Case-insensitive substring match on first name, last name or email.
/// `needle` must already be lowercased.
fn matches_query(contact: &Contact, needle: &str) -> bool {
    [&contact.first_name, &contact.last_name, &contact.email]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Contact not found".to_string())
}

#[derive(Clone)]
pub struct ContactStore {
    db: SqlitePool,
}

impl ContactStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Page of the owner's contacts ordered by id
    pub async fn list(&self, limit: i64, offset: i64, owner: i64) -> ApiResult<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE user_id = ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(contacts)
    }

    pub async fn get(&self, id: i64, owner: i64) -> ApiResult<Contact> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn create(&self, fields: ContactFields, owner: i64) -> ApiResult<Contact> {
        let now = Utc::now();
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (first_name, last_name, email, phone, birthday, additional_data, completed, created_at, updated_at, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.birthday)
        .bind(&fields.additional_data)
        .bind(fields.completed)
        .bind(now)
        .bind(now)
        .bind(owner)
        .fetch_one(&self.db)
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE_EMAIL))?;

        debug!("Created contact {} for user {}", contact.id, owner);
        Ok(contact)
    }

    /// Full replacement of every field; concurrent updates are last-write-wins
    pub async fn update(&self, id: i64, fields: ContactFields, owner: i64) -> ApiResult<Contact> {
        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET first_name = ?, last_name = ?, email = ?, phone = ?, birthday = ?,
                additional_data = ?, completed = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING *
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(fields.birthday)
        .bind(&fields.additional_data)
        .bind(fields.completed)
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| ApiError::from_write(e, DUPLICATE_EMAIL))?
        .ok_or_else(not_found)
    }

    /// Delete and return the removed contact
    pub async fn delete(&self, id: i64, owner: i64) -> ApiResult<Contact> {
        sqlx::query_as::<_, Contact>("DELETE FROM contacts WHERE id = ? AND user_id = ? RETURNING *")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found)
    }

    /// Substring match on first name, last name or email.
    ///
    /// Case folding happens here rather than in SQL since SQLite `LIKE`
    /// only folds ASCII.
    pub async fn search(&self, text: &str, owner: i64) -> ApiResult<Vec<Contact>> {
        let needle = text.to_lowercase();
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE user_id = ? ORDER BY id",
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;

        let found: Vec<Contact> = contacts
            .into_iter()
            .filter(|c| matches_query(c, &needle))
            .collect();
        debug!("Contact search for user {} matched {}", owner, found.len());

        Ok(found)
    }

    /// Contacts whose next birthday falls within a week of `today`, soonest first
    pub async fn upcoming_birthdays(&self, owner: i64, today: NaiveDate) -> ApiResult<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE user_id = ? ORDER BY id",
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;

        let mut upcoming: Vec<(NaiveDate, Contact)> = contacts
            .into_iter()
            .filter_map(|c| birthdays::next_occurrence_within(c.birthday, today).map(|d| (d, c)))
            .collect();
        upcoming.sort_by_key(|(date, contact)| (*date, contact.id));

        Ok(upcoming.into_iter().map(|(_, c)| c).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::users::{NewUser, UserStore};

    async fn setup() -> (ContactStore, i64, i64) {
        let pool = test_pool().await;
        let users = UserStore::new(pool.clone());
        let a = users
            .create(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        let b = users
            .create(NewUser {
                username: "bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();
        (ContactStore::new(pool), a.id, b.id)
    }

    fn fields(first: &str, email: &str, birthday: NaiveDate) -> ContactFields {
        ContactFields {
            first_name: first.to_string(),
            last_name: "Stark".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            birthday,
            additional_data: "note".to_string(),
            completed: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_crud_round() {
        let (store, alice, _) = setup().await;
        let created = store
            .create(fields("Tony", "tony@example.com", date(1970, 5, 29)), alice)
            .await
            .unwrap();
        assert_eq!(created.user_id, alice);
        assert_eq!(store.get(created.id, alice).await.unwrap(), created);

        let mut changed = fields("Anthony", "tony@example.com", date(1970, 5, 29));
        changed.completed = true;
        let updated = store.update(created.id, changed, alice).await.unwrap();
        assert_eq!(updated.first_name, "Anthony");
        assert!(updated.completed);

        let deleted = store.delete(created.id, alice).await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(matches!(store.get(created.id, alice).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let (store, alice, bob) = setup().await;
        let contact = store
            .create(fields("Tony", "tony@example.com", date(1970, 5, 29)), alice)
            .await
            .unwrap();

        assert!(matches!(store.get(contact.id, bob).await, Err(ApiError::NotFound(_))));
        assert!(matches!(
            store
                .update(contact.id, fields("Hacked", "tony@example.com", date(1970, 5, 29)), bob)
                .await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(store.delete(contact.id, bob).await, Err(ApiError::NotFound(_))));
        assert!(store.list(10, 0, bob).await.unwrap().is_empty());

        assert_eq!(store.get(contact.id, alice).await.unwrap().first_name, "Tony");
    }

    #[tokio::test]
    async fn test_list_pagination_ordered_by_id() {
        let (store, alice, _) = setup().await;
        for i in 0..12 {
            store
                .create(fields(&format!("C{}", i), &format!("c{}@example.com", i), date(1990, 1, 1)), alice)
                .await
                .unwrap();
        }

        let first = store.list(10, 0, alice).await.unwrap();
        assert_eq!(first.len(), 10);
        assert!(first.windows(2).all(|w| w[0].id < w[1].id));

        let rest = store.list(10, 10, alice).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].first_name, "C10");
    }

    #[tokio::test]
    async fn test_duplicate_contact_email_conflicts() {
        let (store, alice, bob) = setup().await;
        store
            .create(fields("Tony", "tony@example.com", date(1970, 5, 29)), alice)
            .await
            .unwrap();

        let dup = store
            .create(fields("Other", "tony@example.com", date(1970, 5, 29)), bob)
            .await;
        assert!(matches!(dup, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_search_matches_any_field() {
        let (store, alice, bob) = setup().await;
        let by_email = store
            .create(fields("Natasha", "blackwidow@example.com", date(1984, 11, 22)), alice)
            .await
            .unwrap();
        store
            .create(fields("Bruce", "hulk@example.com", date(1969, 12, 18)), alice)
            .await
            .unwrap();
        store
            .create(fields("Widow", "other@example.com", date(1969, 12, 18)), bob)
            .await
            .unwrap();

        let found = store.search("widow", alice).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, by_email.id);

        let by_last_name = store.search("stark", alice).await.unwrap();
        assert_eq!(by_last_name.len(), 2);

        assert!(store.search("%", alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let (store, alice, _) = setup().await;
        let olek = store
            .create(fields("Олександр", "olek@example.com", date(1991, 8, 24)), alice)
            .await
            .unwrap();
        let mut jurgen = fields("Jürgen", "jurgen@example.com", date(1975, 3, 3));
        jurgen.last_name = "ÖZTÜRK".to_string();
        let jurgen = store.create(jurgen, alice).await.unwrap();

        for query in ["Олек", "олек", "ОЛЕКСАНДР"] {
            let found = store.search(query, alice).await.unwrap();
            assert_eq!(found.len(), 1, "query {}", query);
            assert_eq!(found[0].id, olek.id);
        }

        let found = store.search("öztürk", alice).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, jurgen.id);

        assert_eq!(store.search("JÜRG", alice).await.unwrap()[0].id, jurgen.id);
    }

    #[tokio::test]
    async fn test_upcoming_birthdays_wrap_year() {
        let (store, alice, bob) = setup().await;
        let jan = store
            .create(fields("Jan", "jan@example.com", date(1990, 1, 2)), alice)
            .await
            .unwrap();
        store
            .create(fields("Dec", "dec@example.com", date(1990, 12, 20)), alice)
            .await
            .unwrap();
        let today_bd = store
            .create(fields("Today", "today@example.com", date(1985, 12, 28)), alice)
            .await
            .unwrap();
        store
            .create(fields("Bob's", "bobs@example.com", date(1990, 12, 30)), bob)
            .await
            .unwrap();

        let upcoming = store.upcoming_birthdays(alice, date(2024, 12, 28)).await.unwrap();
        let ids: Vec<i64> = upcoming.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![today_bd.id, jan.id]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_last_write_wins() {
        let (store, alice, _) = setup().await;
        let contact = store
            .create(fields("Tony", "tony@example.com", date(1970, 5, 29)), alice)
            .await
            .unwrap();

        let id = contact.id;
        let writer = move |store: ContactStore, name: &'static str, phone: &'static str| async move {
            let mut f = fields(name, "tony@example.com", date(1970, 5, 29));
            f.phone = phone.to_string();
            store.update(id, f, alice).await
        };

        let first = tokio::spawn(writer(store.clone(), "First", "111"));
        let second = tokio::spawn(writer(store.clone(), "Second", "222"));
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // One write wins whole; fields are never interleaved
        let stored = store.get(id, alice).await.unwrap();
        match stored.first_name.as_str() {
            "First" => assert_eq!(stored.phone, "111"),
            "Second" => assert_eq!(stored.phone, "222"),
            other => panic!("unexpected name {}", other),
        }
    }
}
