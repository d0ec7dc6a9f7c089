//! The accept-and-persist pipeline: canonicalize, stamp, fan out, relay.
//!
//! All mutation of the store funnels through one coordinator holding the
//! single database connection behind a mutex, which is both the single-writer
//! discipline and the monotonic-timestamp source. Broadcasts happen after the
//! commit returns and before the writer lock is released, so peers never see
//! a stroke that did not persist and always see strokes in commit order.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use fresco_store::constants::EVICT_FRACTION;
use fresco_store::{codec, tile_math, Database, StoreStats, Stroke, TileCoord, TileRow};

use crate::error::ServerError;
use crate::relay::Relay;

/// What one accepted stroke produced. An empty tile list means the stroke
/// had no finite points and nothing was written or relayed.
#[derive(Debug)]
pub struct IngestOutcome {
    pub stroke: Stroke,
    pub tiles: Vec<TileCoord>,
}

pub struct IngestCoordinator {
    db: Mutex<Database>,
    relay: Relay,
    gzip_level: u32,
    max_store_bytes: u64,
    last_t: AtomicI64,
}

impl IngestCoordinator {
    pub fn new(db: Database, relay: Relay, gzip_level: u32, max_store_bytes: u64) -> Self {
        Self {
            db: Mutex::new(db),
            relay,
            gzip_level,
            max_store_bytes,
            last_t: AtomicI64::new(0),
        }
    }

    /// Accept one raw stroke. `origin` is the submitting peer session when
    /// the stroke arrived over the channel, `None` for HTTP; only
    /// channel-origin strokes are relayed.
    ///
    /// A storage failure is logged and reported as an empty tile set; the
    /// stroke is then considered not accepted and is not relayed.
    pub async fn ingest(
        &self,
        raw: &Value,
        origin: Option<Uuid>,
    ) -> Result<IngestOutcome, ServerError> {
        let mut db = self.db.lock().await;

        let t = self.next_t();
        let stroke = codec::canonicalize(raw, t);
        let tiles = tile_math::stroke_footprint(&stroke.points, stroke.size);
        if tiles.is_empty() {
            return Ok(IngestOutcome { stroke, tiles });
        }

        self.maybe_evict(&mut db)?;

        let payload = codec::compress(&stroke, self.gzip_level)?;
        let rows: Vec<TileRow> = tiles
            .iter()
            .map(|&TileCoord { tx, ty }| TileRow {
                z: stroke.z,
                tx,
                ty,
                t: stroke.t,
                id: stroke.id.clone(),
                payload: payload.clone(),
            })
            .collect();

        if let Err(e) = db.insert_many(&rows) {
            tracing::error!(error = %e, id = %stroke.id, "stroke insert failed");
            return Ok(IngestOutcome {
                stroke,
                tiles: Vec::new(),
            });
        }

        tracing::debug!(id = %stroke.id, tiles = tiles.len(), t, "stroke persisted");

        if origin.is_some() {
            self.relay.broadcast_stroke(origin, &stroke).await;
        }

        Ok(IngestOutcome { stroke, tiles })
    }

    /// Per-tile history, ordered by `(t, insertion)`.
    pub async fn scan_tile(
        &self,
        z: i64,
        tx: i64,
        ty: i64,
        since: Option<i64>,
    ) -> Result<Vec<Stroke>, ServerError> {
        let db = self.db.lock().await;
        let strokes = match since {
            Some(t0) => db.scan_since(z, tx, ty, t0)?,
            None => db.scan(z, tx, ty)?,
        };
        Ok(strokes)
    }

    pub async fn stats(&self) -> Result<StoreStats, ServerError> {
        let db = self.db.lock().await;
        Ok(db.stats()?)
    }

    pub fn max_store_bytes(&self) -> u64 {
        self.max_store_bytes
    }

    /// Server-assigned timestamp: wall clock, clamped non-decreasing.
    /// Only called under the writer lock.
    fn next_t(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let t = now.max(self.last_t.load(Ordering::Relaxed));
        self.last_t.store(t, Ordering::Relaxed);
        t
    }

    /// The size policy: when the store is at or over budget, drop the
    /// globally oldest tenth of rows and reclaim the pages.
    fn maybe_evict(&self, db: &mut Database) -> Result<(), ServerError> {
        let stats = db.stats()?;
        if stats.total_bytes < self.max_store_bytes || stats.row_count == 0 {
            return Ok(());
        }

        let n = (stats.row_count as f64 * EVICT_FRACTION).ceil() as u64;
        let deleted = db.evict_oldest(n)?;
        db.compact()?;

        tracing::info!(
            deleted,
            total_bytes = stats.total_bytes,
            budget = self.max_store_bytes,
            "store over budget, evicted oldest rows"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionRegistry;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn coordinator_with(max_store_bytes: u64) -> (IngestCoordinator, Arc<SessionRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("tiles.db")).unwrap();
        std::mem::forget(dir);
        let registry = Arc::new(SessionRegistry::new());
        let relay = Relay::new(registry.clone());
        (
            IngestCoordinator::new(db, relay, 6, max_store_bytes),
            registry,
        )
    }

    #[tokio::test]
    async fn ingest_persists_to_every_footprint_tile() {
        let (coord, _registry) = coordinator_with(u64::MAX);

        let raw = json!({"id": "cross-1", "size": 6, "points": [[1020, 50], [1030, 50]]});
        let outcome = coord.ingest(&raw, None).await.unwrap();
        assert_eq!(outcome.tiles.len(), 2);
        assert!(outcome.stroke.t > 0);

        for &TileCoord { tx, ty } in &outcome.tiles {
            let strokes = coord.scan_tile(0, tx, ty, None).await.unwrap();
            assert_eq!(strokes.len(), 1);
            assert_eq!(strokes[0].id, "cross-1");
        }
        // No stray tiles.
        assert!(coord.scan_tile(0, 5, 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_finite_points_writes_nothing() {
        let (coord, _registry) = coordinator_with(u64::MAX);

        let raw = json!({"id": "ghost", "points": [{"x": "NaN", "y": 0}]});
        let outcome = coord.ingest(&raw, None).await.unwrap();
        assert!(outcome.tiles.is_empty());
        assert!(!outcome.stroke.id.is_empty());
        assert_eq!(coord.stats().await.unwrap().row_count, 0);
    }

    #[tokio::test]
    async fn channel_origin_is_relayed_with_exclusion() {
        let (coord, registry) = coordinator_with(u64::MAX);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.register(tx_a).await;
        let _b = registry.register(tx_b).await;

        let raw = json!({"id": "live-1", "points": [[512, 512]]});
        coord.ingest(&raw, Some(a.id)).await.unwrap();

        let frame = rx_b.try_recv().expect("other peer should hear the stroke");
        assert!(frame.contains("live-1"));
        assert!(rx_a.try_recv().is_err(), "originator must not hear itself");
    }

    #[tokio::test]
    async fn http_origin_is_not_relayed() {
        let (coord, registry) = coordinator_with(u64::MAX);

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        registry.register(tx_a).await;

        let raw = json!({"id": "rest-1", "points": [[512, 512]]});
        let outcome = coord.ingest(&raw, None).await.unwrap();
        assert!(!outcome.tiles.is_empty());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn timestamps_are_non_decreasing() {
        let (coord, _registry) = coordinator_with(u64::MAX);

        let mut last = 0;
        for i in 0..10 {
            let raw = json!({"id": format!("s{i}"), "points": [[512, 512]]});
            let outcome = coord.ingest(&raw, None).await.unwrap();
            assert!(outcome.stroke.t >= last);
            last = outcome.stroke.t;
        }
    }

    #[tokio::test]
    async fn over_budget_ingest_evicts_oldest_first() {
        // A 1-byte budget forces the eviction branch on every ingest after
        // the first, so early strokes disappear as new ones land.
        let (coord, _registry) = coordinator_with(1);

        for i in 0..5 {
            let raw = json!({"id": format!("s{i}"), "points": [[512, 512]]});
            coord.ingest(&raw, None).await.unwrap();
        }

        let strokes = coord.scan_tile(0, 0, 0, None).await.unwrap();
        assert!(!strokes.is_empty());
        // The very first stroke is long gone; the newest survives.
        let ids: Vec<_> = strokes.iter().map(|s| s.id.as_str()).collect();
        assert!(!ids.contains(&"s0"));
        assert!(ids.contains(&"s4"));
    }

    #[tokio::test]
    async fn scan_since_filters_by_timestamp() {
        let (coord, _registry) = coordinator_with(u64::MAX);

        let first = coord
            .ingest(&json!({"id": "a", "points": [[512, 512]]}), None)
            .await
            .unwrap();
        coord
            .ingest(&json!({"id": "b", "points": [[512, 512]]}), None)
            .await
            .unwrap();

        let all = coord.scan_tile(0, 0, 0, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let since = coord
            .scan_tile(0, 0, 0, Some(first.stroke.t))
            .await
            .unwrap();
        // Strictly greater: "a" is filtered out unless "b" shares its t.
        assert!(since.iter().all(|s| s.t > first.stroke.t || s.id != "a"));
        assert!(since.len() <= 1 || since.iter().any(|s| s.id == "b"));
    }
}
