use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{BomApprovalStatus, ConfirmationStatus, WorkOrderStatus};

/// Domain events emitted by the services after a successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Category events
    CategoryCreated(Uuid),
    CategoryUpdated(Uuid),
    CategoryMoved {
        category_id: Uuid,
        old_parent_id: Option<Uuid>,
        new_parent_id: Option<Uuid>,
    },
    CategoryDeleted(Uuid),

    // Material events
    MaterialCreated(Uuid),
    MaterialUpdated(Uuid),
    MaterialDeleted(Uuid),

    // BOM events
    BomCreated(Uuid),
    BomUpdated(Uuid),
    BomItemAdded { bom_id: Uuid, item_id: Uuid },
    BomItemRemoved { bom_id: Uuid, item_id: Uuid },
    BomApprovalChanged {
        bom_id: Uuid,
        old_status: BomApprovalStatus,
        new_status: BomApprovalStatus,
    },
    BomDeleted(Uuid),

    // Work order events
    WorkOrderCreated {
        work_order_id: Uuid,
        product_material_id: Uuid,
        planned_quantity: Decimal,
    },
    WorkOrderUpdated(Uuid),
    WorkOrderStatusChanged {
        work_order_id: Uuid,
        old_status: WorkOrderStatus,
        new_status: WorkOrderStatus,
    },
    WorkOrderDeleted(Uuid),

    // Production confirmation events
    ConfirmationCreated {
        confirmation_id: Uuid,
        work_order_id: Uuid,
    },
    ConfirmationUpdated(Uuid),
    ConfirmationStatusChanged {
        confirmation_id: Uuid,
        old_status: ConfirmationStatus,
        new_status: ConfirmationStatus,
    },
    ConfirmationPosted {
        confirmation_id: Uuid,
        work_order_id: Uuid,
        confirmed_quantity: Decimal,
        scrap_quantity: Decimal,
    },
    ConfirmationDeleted(Uuid),

    // Identity events
    UserCreated(Uuid),
    UserUpdated(Uuid),
    UserDeleted(Uuid),
    RoleCreated(Uuid),
    RoleUpdated(Uuid),
    RoleDeleted(Uuid),
    RoleAssigned { user_id: Uuid, role_id: Uuid },
    RoleRevoked { user_id: Uuid, role_id: Uuid },
}

impl Event {
    /// Stable event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::CategoryCreated(_) => "category.created",
            Event::CategoryUpdated(_) => "category.updated",
            Event::CategoryMoved { .. } => "category.moved",
            Event::CategoryDeleted(_) => "category.deleted",
            Event::MaterialCreated(_) => "material.created",
            Event::MaterialUpdated(_) => "material.updated",
            Event::MaterialDeleted(_) => "material.deleted",
            Event::BomCreated(_) => "bom.created",
            Event::BomUpdated(_) => "bom.updated",
            Event::BomItemAdded { .. } => "bom.item_added",
            Event::BomItemRemoved { .. } => "bom.item_removed",
            Event::BomApprovalChanged { .. } => "bom.approval_changed",
            Event::BomDeleted(_) => "bom.deleted",
            Event::WorkOrderCreated { .. } => "work_order.created",
            Event::WorkOrderUpdated(_) => "work_order.updated",
            Event::WorkOrderStatusChanged { .. } => "work_order.status_changed",
            Event::WorkOrderDeleted(_) => "work_order.deleted",
            Event::ConfirmationCreated { .. } => "confirmation.created",
            Event::ConfirmationUpdated(_) => "confirmation.updated",
            Event::ConfirmationStatusChanged { .. } => "confirmation.status_changed",
            Event::ConfirmationPosted { .. } => "confirmation.posted",
            Event::ConfirmationDeleted(_) => "confirmation.deleted",
            Event::UserCreated(_) => "user.created",
            Event::UserUpdated(_) => "user.updated",
            Event::UserDeleted(_) => "user.deleted",
            Event::RoleCreated(_) => "role.created",
            Event::RoleUpdated(_) => "role.updated",
            Event::RoleDeleted(_) => "role.deleted",
            Event::RoleAssigned { .. } => "role.assigned",
            Event::RoleRevoked { .. } => "role.revoked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends without waiting. A full or closed channel is logged and the
    /// event dropped; the write that produced it stands.
    pub async fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = event.name(), "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(event = event.name(), "Event channel closed, dropping event");
            }
        }
    }
}

/// Bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

// Handlers registered with `process_events` see every event in order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Logs each event and hands it to every handler until the channel closes.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!(event = event.name(), "Received event: {:?}", event);

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), "Event handler failed: {}", e);
            }
        }
    }

    debug!("Event channel closed, stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.seen
                .lock()
                .map_err(|e| e.to_string())?
                .push(event.name());
            Ok(())
        }
    }

    #[tokio::test]
    async fn handlers_receive_events_in_order() {
        let (sender, rx) = channel(8);
        let recorder = Arc::new(Recorder::default());
        let handlers: Vec<Arc<dyn EventHandler>> = vec![recorder.clone()];
        let task = tokio::spawn(process_events(rx, handlers));

        sender.send_or_log(Event::MaterialCreated(Uuid::new_v4())).await;
        sender.send_or_log(Event::MaterialDeleted(Uuid::new_v4())).await;
        drop(sender);
        task.await.unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["material.created", "material.deleted"]
        );
    }

    #[tokio::test]
    async fn full_channel_drops_without_failing() {
        let (sender, mut rx) = channel(1);
        sender.send_or_log(Event::UserCreated(Uuid::new_v4())).await;
        sender.send_or_log(Event::UserUpdated(Uuid::new_v4())).await;

        assert_eq!(rx.recv().await.map(|e| e.name()), Some("user.created"));
        assert!(rx.try_recv().is_err());
    }
}
