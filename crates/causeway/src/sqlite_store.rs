//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`migrate`](crate::migrate). Vector search is brute-force cosine
//! similarity over the stored embedding BLOBs; the catalog is a few
//! hundred charities and fourteen categories, so a scan is cheaper than
//! maintaining an index.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use causeway_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use causeway_core::models::{ArticleRecord, CategoryMatch, Charity, Holding, Subscriber, User};
use causeway_core::store::{CategoryCandidate, CharityHit, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_charity(&self, charity: &Charity) -> Result<String> {
        let existing_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM charities WHERE name = ?")
                .bind(&charity.name)
                .fetch_optional(&self.pool)
                .await?;

        if let Some(id) = existing_id {
            sqlx::query(
                "UPDATE charities SET mission = ?, url = ?, wallet = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&charity.mission)
            .bind(&charity.url)
            .bind(&charity.wallet)
            .bind(charity.updated_at)
            .bind(&id)
            .execute(&self.pool)
            .await?;
            return Ok(id);
        }

        sqlx::query(
            r#"
            INSERT INTO charities (id, name, mission, url, wallet, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&charity.id)
        .bind(&charity.name)
        .bind(&charity.mission)
        .bind(&charity.url)
        .bind(&charity.wallet)
        .bind(charity.created_at)
        .bind(charity.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(charity.id.clone())
    }

    async fn set_charity_categories(
        &self,
        charity_id: &str,
        matches: &[CategoryMatch],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM charity_categories WHERE charity_id = ?")
            .bind(charity_id)
            .execute(&mut *tx)
            .await?;

        for (rank, m) in matches.iter().enumerate() {
            sqlx::query(
                "INSERT INTO charity_categories (charity_id, category, similarity, rank) VALUES (?, ?, ?, ?)",
            )
            .bind(charity_id)
            .bind(&m.category)
            .bind(m.similarity)
            .bind(rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_charity_vector(
        &self,
        charity_id: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
    ) -> Result<()> {
        let blob = vec_to_blob(vector);
        sqlx::query(
            r#"
            INSERT INTO charity_vectors (charity_id, embedding, model, dims)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(charity_id) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims
            "#,
        )
        .bind(charity_id)
        .bind(&blob)
        .bind(model)
        .bind(dims as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_category_vector(
        &self,
        category: &str,
        vector: &[f32],
        model: &str,
        dims: usize,
    ) -> Result<()> {
        let blob = vec_to_blob(vector);
        sqlx::query(
            r#"
            INSERT INTO category_vectors (category, embedding, model, dims)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(category) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims
            "#,
        )
        .bind(category)
        .bind(&blob)
        .bind(model)
        .bind(dims as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn category_vector_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM category_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn category_search(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<CategoryCandidate>> {
        let rows = sqlx::query("SELECT category, embedding FROM category_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut candidates: Vec<CategoryCandidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                CategoryCandidate {
                    category: row.get("category"),
                    raw_score: cosine_similarity(query_vec, &vec) as f64,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.category.cmp(&b.category))
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn charity_search(
        &self,
        query_vec: &[f32],
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CharityHit>> {
        let rows = match category {
            Some(cat) => {
                sqlx::query(
                    r#"
                    SELECT c.id, c.name, c.mission, c.wallet, v.embedding
                    FROM charities c
                    JOIN charity_vectors v ON v.charity_id = c.id
                    JOIN charity_categories cc ON cc.charity_id = c.id
                    WHERE cc.category = ?
                    "#,
                )
                .bind(cat)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT c.id, c.name, c.mission, c.wallet, v.embedding
                    FROM charities c
                    JOIN charity_vectors v ON v.charity_id = c.id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<CharityHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                CharityHit {
                    id: row.get("id"),
                    name: row.get("name"),
                    mission: row.get("mission"),
                    wallet: row.get("wallet"),
                    raw_score: cosine_similarity(query_vec, &vec) as f64,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert_user(&self, user: &User, matches: &[CategoryMatch]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, wallet, concern, instant_updates, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                wallet = excluded.wallet,
                concern = excluded.concern,
                instant_updates = excluded.instant_updates
            "#,
        )
        .bind(&user.id)
        .bind(&user.wallet)
        .bind(&user.concern)
        .bind(user.instant_updates as i64)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM user_categories WHERE user_id = ?")
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;

        for (rank, m) in matches.iter().enumerate() {
            sqlx::query(
                "INSERT INTO user_categories (user_id, category, confidence, rank) VALUES (?, ?, ?, ?)",
            )
            .bind(&user.id)
            .bind(&m.category)
            .bind(m.similarity)
            .bind(rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, wallet, concern, instant_updates, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let instant: i64 = r.get("instant_updates");
            User {
                id: r.get("id"),
                wallet: r.get("wallet"),
                concern: r.get("concern"),
                instant_updates: instant != 0,
                created_at: r.get("created_at"),
            }
        }))
    }

    async fn subscribers_for_category(&self, category: &str) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.wallet, u.instant_updates, uc.confidence
            FROM user_categories uc
            JOIN users u ON u.id = uc.user_id
            WHERE uc.category = ?
            ORDER BY u.id ASC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let instant: i64 = r.get("instant_updates");
                Subscriber {
                    user_id: r.get("id"),
                    wallet: r.get("wallet"),
                    category: category.to_string(),
                    confidence: r.get("confidence"),
                    instant_updates: instant != 0,
                }
            })
            .collect())
    }

    async fn portfolio(&self, user_id: &str) -> Result<Vec<Holding>> {
        let rows = sqlx::query(
            "SELECT wallet, charity_name, percentage FROM portfolios WHERE user_id = ? ORDER BY percentage DESC, wallet ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let pct: i64 = r.get("percentage");
                Holding {
                    wallet: r.get("wallet"),
                    name: r.get("charity_name"),
                    percentage: pct.max(0) as u32,
                }
            })
            .collect())
    }

    async fn replace_portfolio(&self, user_id: &str, holdings: &[Holding]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM portfolios WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for h in holdings {
            sqlx::query(
                "INSERT INTO portfolios (user_id, wallet, charity_name, percentage, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&h.wallet)
            .bind(&h.name)
            .bind(i64::from(h.percentage))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn article_seen(&self, link: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE link = ?")
            .bind(link)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn record_article(&self, record: &ArticleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (id, link, title, description, relevant, urgency, top_category, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET
                relevant = excluded.relevant,
                urgency = excluded.urgency,
                top_category = excluded.top_category,
                processed_at = excluded.processed_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.link)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.relevant as i64)
        .bind(record.urgency)
        .bind(&record.top_category)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn charity_names_by_wallets(&self, wallets: &[String]) -> Result<Vec<Option<String>>> {
        let mut names = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let name: Option<String> =
                sqlx::query_scalar("SELECT name FROM charities WHERE wallet = ? LIMIT 1")
                    .bind(wallet)
                    .fetch_optional(&self.pool)
                    .await?;
            names.push(name);
        }
        Ok(names)
    }
}
