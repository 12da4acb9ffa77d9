// Record operations shared by the HTTP and real-time ingress paths

use crate::notifier::{ChangeEvent, ChangeNotifier};
use crate::record::{KindFilter, Record, RecordPayload, ACTUATOR_KIND, SENSOR_KIND};
use crate::store::{RecordStore, SearchFilter};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;


/// Records split by kind. Records of any other kind appear in neither list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionedRecords {
    #[serde(rename = "sensores")]
    pub sensors: Vec<Record>,
    #[serde(rename = "actuadores")]
    pub actuators: Vec<Record>,
}

/// Raw search criteria as received from a client
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub name: Option<String>,
    pub kind: Option<String>,
}

/// Gateway errors
#[derive(Debug)]
pub enum GatewayError {
    InvalidQuery(String),
    NotFound,
    Store(anyhow::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidQuery(msg) => write!(f, "invalid query: {}", msg),
            GatewayError::NotFound => write!(f, "record not found"),
            GatewayError::Store(e) => write!(f, "store error: {:#}", e),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<anyhow::Error> for GatewayError {
    fn from(e: anyhow::Error) -> Self {
        GatewayError::Store(e)
    }
}

/// Translates record operations into store calls and mirrors every
/// successful write through the notifier (exactly one event per write).
pub struct RecordGateway {
    store: Arc<RecordStore>,
    notifier: Arc<ChangeNotifier>,
}

impl RecordGateway {
    pub fn new(store: Arc<RecordStore>, notifier: Arc<ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// All records split into sensors and actuators (case-insensitive kind)
    pub fn list_partitioned(&self) -> Result<PartitionedRecords, GatewayError> {
        let mut partitioned = PartitionedRecords::default();

        for record in self.store.find_all()? {
            if record.kind_matches(SENSOR_KIND) {
                partitioned.sensors.push(record);
            } else if record.kind_matches(ACTUATOR_KIND) {
                partitioned.actuators.push(record);
            }
        }

        Ok(partitioned)
    }

    pub fn create(&self, payload: RecordPayload) -> Result<Record, GatewayError> {
        let record = self.store.insert(payload)?;
        info!(record_id = %record.id, kind = ?record.kind, "Record created");

        self.notifier.publish(ChangeEvent::Saved(record.clone()));
        Ok(record)
    }

    pub fn update(&self, id: &str, payload: RecordPayload) -> Result<Record, GatewayError> {
        let record = self
            .store
            .update_by_id(id, payload)?
            .ok_or(GatewayError::NotFound)?;
        info!(record_id = %record.id, "Record updated");

        self.notifier.publish(ChangeEvent::Updated(record.clone()));
        Ok(record)
    }

    /// Removes a record and returns its pre-deletion state
    pub fn delete(&self, id: &str) -> Result<Record, GatewayError> {
        let record = self.store.delete_by_id(id)?.ok_or(GatewayError::NotFound)?;
        info!(record_id = %record.id, "Record deleted");

        self.notifier.publish(ChangeEvent::Deleted(record.clone()));
        Ok(record)
    }

    pub fn find(&self, id: &str) -> Result<Record, GatewayError> {
        self.store.find_by_id(id)?.ok_or(GatewayError::NotFound)
    }

    /// Search by name substring and/or kind.
    ///
    /// - at least one criterion is required
    /// - `kind` must be "sensores" or "actuadores"
    /// - an empty result is `NotFound`
    pub fn search(&self, criteria: SearchCriteria) -> Result<Vec<Record>, GatewayError> {
        let filter = parse_criteria(criteria)?;
        let records = self.store.search(&filter)?;

        if records.is_empty() {
            return Err(GatewayError::NotFound);
        }

        Ok(records)
    }
}

/// Validate raw criteria. Empty strings count as absent.
fn parse_criteria(criteria: SearchCriteria) -> Result<SearchFilter, GatewayError> {
    let name = criteria.name.filter(|n| !n.is_empty());
    let kind = criteria.kind.filter(|k| !k.is_empty());

    let kind = kind
        .map(|k| {
            KindFilter::parse(&k).ok_or_else(|| {
                GatewayError::InvalidQuery(format!(
                    "tipo must be 'sensores' or 'actuadores', got '{}'",
                    k
                ))
            })
        })
        .transpose()?;

    let filter = SearchFilter { name, kind };
    if filter.is_empty() {
        return Err(GatewayError::InvalidQuery(
            "at least one of 'nombre' or 'tipo' is required".to_string(),
        ));
    }

    Ok(filter)
}
