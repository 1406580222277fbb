use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Default capacity of the in-process event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving half of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when nobody is listening.
    ///
    /// Events are published after commit, so a dropped event never undoes a write.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Event dropped");
        }
    }
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MaterialCreated {
        material_id: String,
    },
    MaterialUpdated {
        material_id: String,
    },
    MaterialDeleted {
        material_id: String,
    },
    SupplierPriceRecorded {
        material_id: String,
        supplier_name: String,
        price: Decimal,
        observed_at: DateTime<Utc>,
    },
    JobCreated {
        job_id: Uuid,
    },
    JobUpdated {
        job_id: Uuid,
    },
    JobDeleted {
        job_id: Uuid,
    },
    JobMaterialsAdded {
        job_id: Uuid,
        material_ids: Vec<String>,
    },
    JobMaterialQuantityUpdated {
        job_id: Uuid,
        material_id: String,
        quantity: Decimal,
    },
    JobMaterialRemoved {
        job_id: Uuid,
        material_id: String,
    },
    ProjectCreated {
        project_id: Uuid,
    },
    ProjectUpdated {
        project_id: Uuid,
    },
    ProjectDeleted {
        project_id: Uuid,
    },
    BoqJobUpserted {
        project_id: Uuid,
        job_id: Uuid,
        quantity: Decimal,
    },
    BoqJobRemoved {
        project_id: Uuid,
        job_id: Uuid,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::MaterialCreated { .. } => "material_created",
            Event::MaterialUpdated { .. } => "material_updated",
            Event::MaterialDeleted { .. } => "material_deleted",
            Event::SupplierPriceRecorded { .. } => "supplier_price_recorded",
            Event::JobCreated { .. } => "job_created",
            Event::JobUpdated { .. } => "job_updated",
            Event::JobDeleted { .. } => "job_deleted",
            Event::JobMaterialsAdded { .. } => "job_materials_added",
            Event::JobMaterialQuantityUpdated { .. } => "job_material_quantity_updated",
            Event::JobMaterialRemoved { .. } => "job_material_removed",
            Event::ProjectCreated { .. } => "project_created",
            Event::ProjectUpdated { .. } => "project_updated",
            Event::ProjectDeleted { .. } => "project_deleted",
            Event::BoqJobUpserted { .. } => "boq_job_upserted",
            Event::BoqJobRemoved { .. } => "boq_job_removed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("boq_events.processed", 1, "event" => event.name());
        match &event {
            Event::MaterialDeleted { material_id } => {
                info!(material_id = %material_id, "Material removed from catalog");
            }
            Event::JobMaterialsAdded {
                job_id,
                material_ids,
            } => {
                info!(job_id = %job_id, count = material_ids.len(), "Job materials added");
            }
            Event::BoqJobUpserted {
                project_id,
                job_id,
                quantity,
            } => {
                info!(
                    project_id = %project_id,
                    job_id = %job_id,
                    quantity = %quantity,
                    "BOQ line written"
                );
            }
            other => {
                info!(event = other.name(), "Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
