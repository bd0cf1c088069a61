use exc_core::{EndpointId, Symbol};

use crate::anomaly::Anomaly;
use crate::record::ExecutionRecord;
use crate::window::AggregateSnapshot;

#[derive(Debug, Clone)]
pub enum EqmEvent {
    ExecutionCompleted(ExecutionRecord),
    AnomalyDetected { record: ExecutionRecord, anomaly: Anomaly },
    AggregationComputed { symbol: Symbol, endpoint_id: EndpointId, short_term: AggregateSnapshot, daily: AggregateSnapshot },
}
