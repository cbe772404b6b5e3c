//! Cache and entry operations on the SQLite store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

use super::connection::CacheDb;
use super::{CacheStorage, ensure_storable, hash, vary_matches};
use crate::Error;
use crate::http::{Request, Response, ResponseType, vary_names};

/// Raw entry row before URL and JSON decoding.
struct EntryRow {
    request_headers_json: String,
    response_url: String,
    status: u16,
    status_text: String,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn decode(self) -> Result<(BTreeMap<String, String>, Response), Error> {
        let request_headers: BTreeMap<String, String> = serde_json::from_str(&self.request_headers_json)?;
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers_json)?;
        let url = Url::parse(&self.response_url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let response_type = ResponseType::parse(&self.response_type)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown response type: {}", self.response_type)))?;

        let response = Response {
            url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
            response_type,
        };
        Ok((request_headers, response))
    }
}

impl CacheDb {
    /// Create the named cache if it does not exist.
    pub async fn open_cache(&self, cache_name: &str) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache_name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the stored response for a request.
    ///
    /// Returns None if the cache or the entry doesn't exist, or if every
    /// stored variant varies on a header the request disagrees on.
    pub async fn get_entry(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        let cache_name = cache_name.to_string();
        let key_hash = hash::request_key(request);

        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT request_headers_json, response_url, status, status_text,
                            response_type, headers_json, body
                     FROM entries WHERE cache_name = ?1 AND key_hash = ?2
                     ORDER BY id ASC",
                )?;

                let rows = stmt
                    .query_map(params![cache_name, key_hash], |row| {
                        Ok(EntryRow {
                            request_headers_json: row.get(0)?,
                            response_url: row.get(1)?,
                            status: row.get(2)?,
                            status_text: row.get(3)?,
                            response_type: row.get(4)?,
                            headers_json: row.get(5)?,
                            body: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        for row in rows {
            let (stored_headers, response) = row.decode()?;
            if vary_matches(&stored_headers, &response.vary(), request) {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Store the entry for a request, replacing the variants it would match.
    ///
    /// Creates the cache row first, so storing into an unopened cache opens it.
    pub async fn put_entry(&self, cache_name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        ensure_storable(request)?;

        let cache_name = cache_name.to_string();
        let key_hash = hash::request_key(request);
        let method = request.method.as_str();
        let url = hash::keyed_url(request).to_string();
        let incoming = request.clone();
        let request_headers_json = serde_json::to_string(&request.headers)?;
        let response_url = response.url.to_string();
        let status = response.status;
        let status_text = response.status_text.clone();
        let response_type = response.response_type.as_str();
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![cache_name, now],
                )?;

                let variants = {
                    let mut stmt = tx.prepare(
                        "SELECT id, request_headers_json, headers_json
                         FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    )?;
                    let rows = stmt
                        .query_map(params![cache_name, key_hash], |row| {
                            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    rows
                };

                for (id, stored_request_json, stored_headers_json) in variants {
                    let stored_request: BTreeMap<String, String> = serde_json::from_str(&stored_request_json)?;
                    let stored_headers: BTreeMap<String, String> = serde_json::from_str(&stored_headers_json)?;
                    if vary_matches(&stored_request, &vary_names(&stored_headers), &incoming) {
                        tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
                    }
                }

                tx.execute(
                    "INSERT INTO entries (
                        cache_name, key_hash, method, url, request_headers_json,
                        response_url, status, status_text, response_type, headers_json,
                        body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        cache_name,
                        key_hash,
                        method,
                        url,
                        request_headers_json,
                        response_url,
                        status,
                        status_text,
                        response_type,
                        headers_json,
                        body,
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache; its entries go with it via `ON DELETE CASCADE`.
    pub async fn delete_cache(&self, cache_name: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![cache_name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List cache names in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// List request URLs stored in a cache in insertion order.
    pub async fn entry_urls(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY id ASC")?;
                let urls = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, cache_name: &str) -> Result<(), Error> {
        self.open_cache(cache_name).await
    }

    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.get_entry(cache_name, request).await
    }

    async fn put(&self, cache_name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entry(cache_name, request, response).await
    }

    async fn delete(&self, cache_name: &str) -> Result<bool, Error> {
        self.delete_cache(cache_name).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.cache_names().await
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        self.entry_urls(cache_name).await
    }
}
