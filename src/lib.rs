pub mod aggregate;
pub mod error;
pub mod model;
pub mod normalize;
pub mod settings;
pub mod snapshot;
pub mod source;
pub mod watermark;

pub use error::Error;

use chrono::Utc;
use model::{ChannelReading, PresentationSnapshot, WatermarkRecord};
use source::Source;
use watermark::WatermarkStore;

use std::sync::Arc;

/// Result of one fetch cycle: the normalized channels and the snapshot built from them.
#[derive(Debug, Clone)]
pub struct FetchCycle {
    pub channels: Vec<ChannelReading>,
    pub snapshot: PresentationSnapshot,
}

pub struct Collector {
    source: Source,
    store: Arc<dyn WatermarkStore>,
}

impl Collector {
    pub fn new(source: Source, store: Box<dyn WatermarkStore>) -> Self {
        Collector {
            source,
            store: Arc::from(store),
        }
    }

    /// Run one fetch cycle. Failures degrade to zero values and are only logged.
    pub async fn collect(&self) -> FetchCycle {
        let observed_at = Utc::now();

        let channels = match self.source.fetch().await {
            Ok(raw) => Some(normalize::normalize(&raw)),
            Err(e) => {
                log::warn!("{}; reporting zero readings", e);
                None
            }
        };

        let aggregate = aggregate::aggregate(channels.as_deref().unwrap_or(&[]), observed_at);
        /* only a successful fetch moves the watermark */
        let watermark = match channels {
            Some(_) => {
                let observed = aggregate.clone();
                self.persist(move |store| store.record(&observed)).await
            }
            None => self.persist(|store| store.latest()).await.flatten(),
        };

        FetchCycle {
            snapshot: snapshot::assemble(&aggregate, watermark.as_ref()),
            channels: channels.unwrap_or_default(),
        }
    }

    /// Store access does blocking IO, so it runs on the blocking thread pool.
    async fn persist<T, F>(&self, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn WatermarkStore) -> Result<T, Error> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || op(store.as_ref())).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                log::warn!("{}; reporting unknown maximum", e);
                None
            }
            Err(e) => {
                log::error!("Watermark task failed: {}; reporting unknown maximum", e);
                None
            }
        }
    }

    pub async fn latest_watermark(&self) -> Option<WatermarkRecord> {
        self.persist(|store| store.latest()).await.flatten()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use model::{AggregateSnapshot, WatermarkPolicy};
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};
    use watermark::{FileStore, MemoryStore};

    fn resource(filename: &str) -> PathBuf {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        d
    }

    fn unreachable_store(dir: &TempDir) -> Box<dyn WatermarkStore> {
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        /* a path below a regular file can never be opened */
        Box::new(FileStore::new(
            blocker.join("wm.jsonl"),
            WatermarkPolicy::Append,
        ))
    }

    #[tokio::test]
    async fn fixture_cycle() {
        let collector = Collector::new(
            Source::fixture(resource("pvDataCamelCase.json")),
            Box::new(MemoryStore::new(WatermarkPolicy::Append)),
        );

        let cycle = collector.collect().await;
        assert_eq!(2, cycle.channels.len());
        assert!((cycle.snapshot.total_power_watts - 203.4).abs() < 1e-9);
        assert_eq!(600, cycle.snapshot.total_energy_total_wh);
        assert_eq!(25, cycle.snapshot.total_energy_daily_wh);
        assert_eq!(
            cycle.snapshot.total_power_watts,
            cycle.snapshot.max_power_watts
        );
    }

    #[tokio::test]
    async fn unavailable_source_keeps_last_watermark() {
        let store = MemoryStore::new(WatermarkPolicy::Append);
        store
            .append(&AggregateSnapshot::zero(Utc::now()), 77.0)
            .unwrap();
        let collector = Collector::new(
            Source::fixture(resource("does_not_exist.json")),
            Box::new(store),
        );

        let cycle = collector.collect().await;
        assert!(cycle.channels.is_empty());
        assert_eq!(
            PresentationSnapshot {
                total_power_watts: 0.0,
                total_energy_total_wh: 0,
                total_energy_daily_wh: 0,
                max_power_watts: 77.0,
            },
            cycle.snapshot
        );
        /* a failed fetch does not append */
        assert_eq!(
            77.0,
            collector.latest_watermark().await.unwrap().max_power_watts
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_cycles_share_one_watermark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wm.jsonl");
        let collector = Arc::new(Collector::new(
            Source::fixture(resource("pvDataCamelCase.json")),
            Box::new(FileStore::new(&path, WatermarkPolicy::Append)),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let collector = Arc::clone(&collector);
                tokio::spawn(async move { collector.collect().await })
            })
            .collect();
        for handle in handles {
            let cycle = handle.await.unwrap();
            assert!((cycle.snapshot.max_power_watts - 203.4).abs() < 1e-9);
        }

        let lines = std::fs::read_to_string(&path).unwrap();
        assert_eq!(16, lines.lines().count());
    }

    #[tokio::test]
    async fn unavailable_source_and_store() {
        let dir = tempdir().unwrap();
        let collector = Collector::new(
            Source::fixture(resource("does_not_exist.json")),
            unreachable_store(&dir),
        );
        let cycle = collector.collect().await;
        assert_eq!(0.0, cycle.snapshot.total_power_watts);
        assert_eq!(0.0, cycle.snapshot.max_power_watts);
    }

    #[tokio::test]
    async fn unavailable_store_still_reports_totals() {
        let dir = tempdir().unwrap();
        let collector = Collector::new(
            Source::fixture(resource("pvDataCamelCase.json")),
            unreachable_store(&dir),
        );
        let cycle = collector.collect().await;
        assert_eq!(600, cycle.snapshot.total_energy_total_wh);
        assert_eq!(0.0, cycle.snapshot.max_power_watts);
    }

    #[tokio::test]
    async fn unrecognized_fixture_reports_zero() {
        let collector = Collector::new(
            Source::fixture(resource("valid_json.json")),
            Box::new(MemoryStore::new(WatermarkPolicy::Append)),
        );
        let cycle = collector.collect().await;
        assert!(cycle.channels.is_empty());
        assert_eq!(0.0, cycle.snapshot.total_power_watts);
        assert_eq!(0.0, cycle.snapshot.max_power_watts);
    }
}
