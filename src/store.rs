use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, StoreBackend};
use crate::error::StoreError;
use crate::models::{SubmissionPayload, SubmissionRecord, Supervisor};
use crate::normalize::{encode_items, encode_observations};
use crate::period::{Period, Quarter};
use crate::util::{parse_timestamp, value_as_f64};

/// Which submissions a fetch asks for. The store is expected to scope by
/// branch; the assembler still trusts only the month field.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub branch_code: String,
    pub year: i32,
    pub quarter: Quarter,
    pub month: Option<u32>,
}

impl RecordQuery {
    pub fn quarter(branch_code: &str, year: i32, quarter: Quarter) -> Self {
        Self {
            branch_code: branch_code.to_string(),
            year,
            quarter,
            month: None,
        }
    }

    pub fn month(branch_code: &str, period: Period) -> Self {
        Self {
            branch_code: branch_code.to_string(),
            year: period.year(),
            quarter: period.quarter(),
            month: Some(period.month()),
        }
    }

    fn months(&self) -> Vec<u32> {
        match self.month {
            Some(month) => vec![month],
            None => self.quarter.months().to_vec(),
        }
    }
}

pub enum RecordStore {
    Http(HttpStore),
    Postgres(PgStore),
}

impl RecordStore {
    pub async fn open(config: &AppConfig, backend: StoreBackend) -> Result<Self, StoreError> {
        match backend {
            StoreBackend::Http => {
                let url = config
                    .api_url
                    .as_deref()
                    .ok_or(StoreError::NotConfigured("CHECKLIST_API_URL"))?;
                Ok(RecordStore::Http(HttpStore::new(url)?))
            }
            StoreBackend::Postgres => Ok(RecordStore::Postgres(PgStore::open(config).await?)),
        }
    }

    pub async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<SubmissionRecord>, StoreError> {
        let mut records = match self {
            RecordStore::Http(store) => store.fetch_records(query).await?,
            RecordStore::Postgres(store) => store.fetch_records(query).await?,
        };
        records.retain(|record| belongs_to_branch(record, &query.branch_code));
        info!(
            branch_code = %query.branch_code,
            year = query.year,
            quarter = query.quarter.number(),
            month = ?query.month,
            rows = records.len(),
            "fetched submissions"
        );
        Ok(records)
    }

    pub async fn append(&self, payload: &SubmissionPayload) -> Result<(), StoreError> {
        match self {
            RecordStore::Http(store) => store.append(payload).await?,
            RecordStore::Postgres(store) => store.append(payload).await?,
        }
        info!(
            branch_code = %payload.branch_code,
            visit_id = %payload.visit_id,
            total = payload.total,
            send_email = payload.send_email,
            "submission stored"
        );
        Ok(())
    }
}

/// Rows that name another branch are dropped; rows without a branch are kept.
fn belongs_to_branch(record: &SubmissionRecord, branch_code: &str) -> bool {
    record
        .branch_code
        .as_deref()
        .map_or(true, |code| code.trim() == branch_code)
}

/// Web endpoint in front of the spreadsheet-backed record store.
pub struct HttpStore {
    client: Client,
    url: String,
}

impl HttpStore {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("branch-visit-checklist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<SubmissionRecord>, StoreError> {
        let mut params = vec![
            ("branchCode", query.branch_code.clone()),
            ("year", query.year.to_string()),
            ("quarter", query.quarter.number().to_string()),
        ];
        if let Some(month) = query.month {
            params.push(("month", month.to_string()));
        }

        let response = self.client.get(&self.url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_envelope(&body)
    }

    pub async fn append(&self, payload: &SubmissionPayload) -> Result<(), StoreError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        Ok(())
    }
}

/// Reads the `{ "data": [...] }` envelope. A missing or non-array `data` is
/// an empty result; a body that is not JSON is a transport failure.
pub fn parse_envelope(body: &str) -> Result<Vec<SubmissionRecord>, StoreError> {
    let envelope: Value = serde_json::from_str(body)?;
    let Some(rows) = envelope.get("data").and_then(Value::as_array) else {
        debug!("record store envelope has no data array");
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<SubmissionRecord>(row.clone()) {
            Ok(record) => records.push(record),
            Err(err) => warn!(error = %err, "skipping unreadable submission row"),
        }
    }
    Ok(records)
}

/// Postgres mirror of the record store, kept append-only.
pub struct PgStore {
    pool: PgPool,
}

struct NewRow<'a> {
    visit_id: Uuid,
    branch_code: &'a str,
    branch_name: &'a str,
    zone: &'a str,
    region: &'a str,
    supervisor: Option<&'a Supervisor>,
    supervisor_kind: Option<&'a str>,
    period: Period,
    submitted_at: DateTime<Utc>,
    items_json: String,
    obs_json: String,
    total: f64,
    send_email: bool,
    source_key: Option<String>,
}

impl PgStore {
    pub async fn open(config: &AppConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(StoreError::NotConfigured("DATABASE_URL"))?;
        Self::connect(url).await
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init_db(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<SubmissionRecord>, StoreError> {
        let months: Vec<i32> = query.months().into_iter().map(|m| m as i32).collect();
        let rows = sqlx::query(
            r#"
            SELECT branch_code, period_year, period_month, submitted_at, items_json, obs_json, total
            FROM checklist.submissions
            WHERE branch_code = $1 AND period_year = $2 AND period_month = ANY($3)
            ORDER BY seq
            "#,
        )
        .bind(&query.branch_code)
        .bind(query.year)
        .bind(months)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let month: i32 = row.get("period_month");
            records.push(SubmissionRecord {
                branch_code: Some(row.get("branch_code")),
                period_year: Some(row.get("period_year")),
                period_month: month as u32,
                timestamp: Some(row.get("submitted_at")),
                items_json: Some(row.get("items_json")),
                obs_json: Some(row.get("obs_json")),
                total: row.get("total"),
            });
        }
        Ok(records)
    }

    pub async fn append(&self, payload: &SubmissionPayload) -> Result<(), StoreError> {
        let row = NewRow {
            visit_id: payload.visit_id,
            branch_code: &payload.branch_code,
            branch_name: &payload.branch_name,
            zone: &payload.zone,
            region: &payload.region,
            supervisor: Some(&payload.supervisor),
            supervisor_kind: Some(payload.supervisor_kind.as_str()),
            period: payload.period,
            submitted_at: payload.date,
            items_json: encode_items(&payload.items)?,
            obs_json: encode_observations(&payload.observations)?,
            total: payload.total,
            send_email: payload.send_email,
            source_key: None,
        };
        self.insert(row).await?;
        Ok(())
    }

    /// Demo branch 101 with a full first quarter of 2026, including a
    /// resubmission for January that supersedes the first one.
    pub async fn seed(&self) -> Result<usize, StoreError> {
        let submissions = vec![
            (
                "seed-101-2026-01-a",
                1,
                "2026-01-12T14:00:00Z",
                [5, 4, 6, 5, 3],
                vec!["Queue reached the street at opening"],
                4.7,
            ),
            (
                "seed-101-2026-01-b",
                1,
                "2026-01-19T10:30:00Z",
                [6, 5, 7, 6, 5],
                vec!["Queue reached the street at opening", "Second teller opened"],
                5.85,
            ),
            (
                "seed-101-2026-02",
                2,
                "2026-02-16T11:00:00Z",
                [8, 8, 7, 9, 6],
                vec!["New signage installed"],
                7.7,
            ),
            (
                "seed-101-2026-03",
                3,
                "2026-03-18T09:45:00Z",
                [5, 6, 4, 5, 6],
                vec![],
                5.15,
            ),
        ];
        let item_ids = ["ATT-01", "ATT-02", "OPS-01", "OPS-02", "SEC-01"];
        let supervisor = Supervisor {
            name: "Ana Ruiz".to_string(),
            email: "ana.ruiz@example.com".to_string(),
        };

        let mut inserted = 0usize;
        for (source_key, month, timestamp, scores, notes, total) in submissions {
            let items: Vec<Value> = item_ids
                .iter()
                .zip(scores)
                .map(|(id, score)| json!({ "id": id, "score": score }))
                .collect();
            let observations: Vec<Value> = notes
                .iter()
                .enumerate()
                .map(|(index, text)| json!({ "n": index + 1, "text": text }))
                .collect();

            let Some(submitted_at) = parse_timestamp(timestamp) else {
                continue;
            };
            let Ok(period) = Period::new(2026, month) else {
                continue;
            };

            inserted += self
                .insert(NewRow {
                    visit_id: Uuid::new_v4(),
                    branch_code: "101",
                    branch_name: "Centro",
                    zone: "Zona 1",
                    region: "Norte",
                    supervisor: Some(&supervisor),
                    supervisor_kind: Some("zonal"),
                    period,
                    submitted_at,
                    items_json: serde_json::to_string(&items)?,
                    obs_json: serde_json::to_string(&observations)?,
                    total,
                    send_email: false,
                    source_key: Some(source_key.to_string()),
                })
                .await? as usize;
        }

        Ok(inserted)
    }

    /// Loads rows exported from the record store. Rows with an unreadable
    /// month or timestamp are skipped; `source_key` makes re-imports no-ops.
    pub async fn import_csv(&self, csv_path: &std::path::Path) -> Result<usize, StoreError> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            #[serde(alias = "branchCode")]
            branch_code: String,
            #[serde(alias = "periodYear")]
            period_year: i32,
            #[serde(alias = "periodMonth")]
            period_month: u32,
            timestamp: String,
            #[serde(rename = "itemsJson", alias = "items_json", default)]
            items_json: Option<String>,
            #[serde(rename = "obsJson", alias = "obs_json", default)]
            obs_json: Option<String>,
            #[serde(default)]
            total: Option<String>,
            #[serde(default)]
            source_key: Option<String>,
        }

        let mut reader = csv::Reader::from_path(csv_path)?;
        let mut inserted = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            let Ok(period) = Period::new(row.period_year, row.period_month) else {
                warn!(month = row.period_month, "skipping row with invalid month");
                continue;
            };
            let Some(submitted_at) = parse_timestamp(&row.timestamp) else {
                warn!(timestamp = %row.timestamp, "skipping row with unreadable timestamp");
                continue;
            };
            let total = row
                .total
                .as_deref()
                .and_then(|raw| value_as_f64(&Value::from(raw)))
                .unwrap_or(0.0);
            let source_key = row
                .source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

            inserted += self
                .insert(NewRow {
                    visit_id: Uuid::new_v4(),
                    branch_code: row.branch_code.trim(),
                    branch_name: "",
                    zone: "",
                    region: "",
                    supervisor: None,
                    supervisor_kind: None,
                    period,
                    submitted_at,
                    items_json: row.items_json.unwrap_or_else(|| "[]".to_string()),
                    obs_json: row.obs_json.unwrap_or_else(|| "[]".to_string()),
                    total,
                    send_email: false,
                    source_key: Some(source_key),
                })
                .await? as usize;
        }

        Ok(inserted)
    }

    async fn insert(&self, row: NewRow<'_>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO checklist.submissions
            (id, visit_id, branch_code, branch_name, zone, region,
             supervisor_name, supervisor_email, supervisor_kind,
             period_year, period_quarter, period_month, submitted_at,
             items_json, obs_json, total, send_email, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.visit_id)
        .bind(row.branch_code)
        .bind(row.branch_name)
        .bind(row.zone)
        .bind(row.region)
        .bind(row.supervisor.map(|s| s.name.as_str()))
        .bind(row.supervisor.map(|s| s.email.as_str()))
        .bind(row.supervisor_kind)
        .bind(row.period.year())
        .bind(row.period.quarter().number() as i32)
        .bind(row.period.month() as i32)
        .bind(row.submitted_at)
        .bind(row.items_json)
        .bind(row.obs_json)
        .bind(row.total)
        .bind(row.send_email)
        .bind(row.source_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
