use parking_lot::Mutex;
use tracing::info;

use super::types::{TradeRecord, TradeStatus};

/// 每次状态迁移后收到一份完整快照；外部持久化层在这里接入。
pub trait TradeSink: Send + Sync {
    fn record(&self, record: &TradeRecord);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TradeSink for NoopSink {
    fn record(&self, _record: &TradeRecord) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TradeSink for LogSink {
    fn record(&self, record: &TradeRecord) {
        info!(
            target: "engine::sink",
            trade_id = %record.id,
            status = %record.status,
            signature = record.signature.as_deref().unwrap_or(""),
            legs_confirmed = record.legs_confirmed,
            legs_total = record.legs_total,
            "交易记录已更新"
        );
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<TradeRecord>>,
}

impl MemorySink {
    pub fn snapshots(&self) -> Vec<TradeRecord> {
        self.snapshots.lock().clone()
    }

    pub fn latest(&self) -> Option<TradeRecord> {
        self.snapshots.lock().last().cloned()
    }

    pub fn statuses(&self) -> Vec<TradeStatus> {
        self.snapshots.lock().iter().map(|record| record.status).collect()
    }
}

impl TradeSink for MemorySink {
    fn record(&self, record: &TradeRecord) {
        self.snapshots.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FeeLevel;
    use crate::engine::types::tests::sample_request;

    #[test]
    fn memory_sink_keeps_every_snapshot() {
        let sink = MemorySink::default();
        let mut record = TradeRecord::new(&sample_request(), FeeLevel::High);
        sink.record(&record);
        record.advance(TradeStatus::QuoteFetched).expect("advance");
        sink.record(&record);
        assert_eq!(
            sink.statuses(),
            vec![TradeStatus::Created, TradeStatus::QuoteFetched]
        );
        assert_eq!(
            sink.latest().map(|latest| latest.status),
            Some(TradeStatus::QuoteFetched)
        );
    }
}
