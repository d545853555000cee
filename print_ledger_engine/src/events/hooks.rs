use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    JobCancelledEvent,
    JobCompletedEvent,
    PickupCodeIssuedEvent,
    SettlementEvent,
};

/// The senders that the APIs publish to. Each list is empty when nobody subscribed to that event.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub pickup_code_issued_producer: Vec<EventProducer<PickupCodeIssuedEvent>>,
    pub job_completed_producer: Vec<EventProducer<JobCompletedEvent>>,
    pub job_cancelled_producer: Vec<EventProducer<JobCancelledEvent>>,
    pub settlement_producer: Vec<EventProducer<SettlementEvent>>,
}

/// Publishes `event` to every producer in the list.
pub async fn publish<E: Clone + Send + Sync>(producers: &[EventProducer<E>], event: E) {
    for producer in producers {
        producer.publish_event(event.clone()).await;
    }
}

pub struct EventHandlers {
    pub on_pickup_code_issued: Option<EventHandler<PickupCodeIssuedEvent>>,
    pub on_job_completed: Option<EventHandler<JobCompletedEvent>>,
    pub on_job_cancelled: Option<EventHandler<JobCancelledEvent>>,
    pub on_settlement: Option<EventHandler<SettlementEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_pickup_code_issued: hooks.on_pickup_code_issued.map(|f| EventHandler::new(buffer_size, f)),
            on_job_completed: hooks.on_job_completed.map(|f| EventHandler::new(buffer_size, f)),
            on_job_cancelled: hooks.on_job_cancelled.map(|f| EventHandler::new(buffer_size, f)),
            on_settlement: hooks.on_settlement.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_pickup_code_issued {
            result.pickup_code_issued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_job_completed {
            result.job_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_job_cancelled {
            result.job_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_settlement {
            result.settlement_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered hook. Each task ends once every producer handed out for it has been dropped.
    pub async fn start_handlers(self) {
        debug!("📬️ Starting event hook handlers");
        if let Some(handler) = self.on_pickup_code_issued {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_job_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_job_cancelled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_settlement {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_pickup_code_issued: Option<Handler<PickupCodeIssuedEvent>>,
    pub on_job_completed: Option<Handler<JobCompletedEvent>>,
    pub on_job_cancelled: Option<Handler<JobCancelledEvent>>,
    pub on_settlement: Option<Handler<SettlementEvent>>,
}

impl EventHooks {
    pub fn on_pickup_code_issued<F>(&mut self, f: F) -> &mut Self
    where F: Fn(PickupCodeIssuedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_pickup_code_issued = Some(Arc::new(f));
        self
    }

    pub fn on_job_completed<F>(&mut self, f: F) -> &mut Self
    where F: Fn(JobCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_job_completed = Some(Arc::new(f));
        self
    }

    pub fn on_job_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: Fn(JobCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_job_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_settlement<F>(&mut self, f: F) -> &mut Self
    where F: Fn(SettlementEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_settlement = Some(Arc::new(f));
        self
    }
}
