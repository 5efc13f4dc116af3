use log::info;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::str::FromStr;

use crate::error::DbError;
use crate::models::{NewPoll, Poll, QUALITY_CONTROL_AUTHOR_ID, Response, User};

const POLL_COLUMNS: &str =
    "questionid, authorid, question, description, start_time, response1, response2, response3, response4";

// Column affinity still lets a TEXT value into `response`; those read as NULL
const RESPONSE_COLUMN: &str =
    "CASE WHEN typeof(response) = 'integer' THEN response END AS response";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, DbError> {
        // Create the database file if it doesn't exist
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        // Initialize schema
        Self::init_schema(&pool).await?;
        info!("Database ready at {}", db_url);

        Ok(Self { pool })
    }

    #[cfg(test)]
    /// Single-connection in-memory database; every connection to `:memory:`
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
        // Create users table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                userid INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Create polls table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                questionid INTEGER PRIMARY KEY AUTOINCREMENT,
                authorid INTEGER NOT NULL,
                question TEXT NOT NULL,
                description TEXT,
                start_time TEXT,
                response1 TEXT,
                response2 TEXT,
                response3 TEXT,
                response4 TEXT,
                FOREIGN KEY (authorid) REFERENCES users(userid)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Create responses table, one row per user and poll
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                userid INTEGER NOT NULL,
                questionid INTEGER NOT NULL,
                response INTEGER NOT NULL,
                PRIMARY KEY (userid, questionid),
                FOREIGN KEY (userid) REFERENCES users(userid),
                FOREIGN KEY (questionid) REFERENCES polls(questionid)
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Quality-control polls are authored by this reserved user
        sqlx::query("INSERT OR IGNORE INTO users (userid, username) VALUES (?, 'quality-control')")
            .bind(QUALITY_CONTROL_AUTHOR_ID)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<User, DbError> {
        let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(classify_write_error)?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
        })
    }

    pub async fn create_poll(&self, poll: &NewPoll) -> Result<i64, DbError> {
        // Insert the poll with its four option slots
        let [r1, r2, r3, r4] = &poll.options;
        let result = sqlx::query(
            r#"
            INSERT INTO polls (authorid, question, description, start_time, response1, response2, response3, response4)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(poll.author_id)
        .bind(&poll.question)
        .bind(&poll.description)
        .bind(&poll.start_time)
        .bind(r1)
        .bind(r2)
        .bind(r3)
        .bind(r4)
        .execute(&self.pool)
        .await
        .map_err(classify_write_error)?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_poll(&self, poll_id: i64) -> Result<Poll, DbError> {
        let row = sqlx::query(&format!("SELECT {} FROM polls WHERE questionid = ?", POLL_COLUMNS))
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NotFound)?;

        poll_from_row(&row)
    }

    /// All polls, newest first.
    pub async fn get_polls(&self) -> Result<Vec<Poll>, DbError> {
        sqlx::query(&format!("SELECT {} FROM polls ORDER BY questionid DESC", POLL_COLUMNS))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(poll_from_row)
            .collect()
    }

    pub async fn get_random_quality_control_poll(&self) -> Result<Option<Poll>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM polls WHERE authorid = ? ORDER BY RANDOM() LIMIT 1",
            POLL_COLUMNS
        ))
        .bind(QUALITY_CONTROL_AUTHOR_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(poll_from_row).transpose()
    }

    /// Records a response. A second response from the same user to the same
    /// poll is reported as [`DbError::DuplicateResponse`].
    pub async fn create_response(&self, response: &Response) -> Result<(), DbError> {
        sqlx::query("INSERT INTO responses (userid, questionid, response) VALUES (?, ?, ?)")
            .bind(response.user_id)
            .bind(response.question_id)
            .bind(i64::from(response.option))
            .execute(&self.pool)
            .await
            .map_err(classify_write_error)?;

        Ok(())
    }

    /// Raw option numbers recorded for a poll, unvalidated. A stored value
    /// that is not an integer comes back as `None`.
    pub async fn get_poll_responses(&self, question_id: i64) -> Result<Vec<Option<i64>>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM responses WHERE questionid = ?",
            RESPONSE_COLUMN
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Option<i64>, _>("response").map_err(DbError::from))
            .collect()
    }

    /// Every recorded `(questionid, response)` pair, ordered by poll.
    pub async fn get_all_responses(&self) -> Result<Vec<(i64, Option<i64>)>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT questionid, {} FROM responses ORDER BY questionid",
            RESPONSE_COLUMN
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<(i64, Option<i64>), DbError> {
                Ok((
                    row.try_get::<i64, _>("questionid")?,
                    row.try_get::<Option<i64>, _>("response")?,
                ))
            })
            .collect()
    }
}

fn poll_from_row(row: &SqliteRow) -> Result<Poll, DbError> {
    Ok(Poll {
        id: row.try_get("questionid")?,
        author_id: row.try_get("authorid")?,
        question: row.try_get("question")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        options: [
            row.try_get("response1")?,
            row.try_get("response2")?,
            row.try_get("response3")?,
            row.try_get("response4")?,
        ],
    })
}

/// Maps constraint violations on insert to their domain meaning.
fn classify_write_error(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return DbError::ForeignKey;
        }
        if db_err.is_unique_violation() {
            return DbError::DuplicateResponse;
        }
    }
    DbError::Sqlx(err)
}
