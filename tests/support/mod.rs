use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use synth_payments::{Bank, ChannelProvisioner, ChannelSpec, Event, EventSink, Payment, SinkError};

/// Records every published event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
    flushes: AtomicUsize,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The payment status updates, in arrival order.
    pub fn payments(&self) -> Vec<Payment> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::PaymentStatus(payment) => Some(payment),
                Event::BankUpdate(_) => None,
            })
            .collect()
    }

    /// The bank updates, in arrival order.
    pub fn banks(&self) -> Vec<Bank> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::BankUpdate(bank) => Some(bank),
                Event::PaymentStatus(_) => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: Event) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Delivers everything except publishes to one channel, which always fail.
#[derive(Debug)]
pub struct FailingSink {
    fail_channel: String,
    delivered: Mutex<Vec<Event>>,
}

impl FailingSink {
    pub fn new(fail_channel: &str) -> Self {
        Self {
            fail_channel: fail_channel.to_string(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered(&self) -> Vec<Event> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for FailingSink {
    async fn publish(&self, event: Event) -> Result<(), SinkError> {
        if event.channel() == self.fail_channel {
            return Err(SinkError::Publish {
                channel: self.fail_channel.clone(),
                reason: "simulated transport failure".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(event);
        Ok(())
    }
}

/// Records which channels were ensured at startup.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    channels: Mutex<Vec<ChannelSpec>>,
}

impl RecordingProvisioner {
    pub fn ensured(&self) -> Vec<ChannelSpec> {
        self.channels.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelProvisioner for RecordingProvisioner {
    async fn ensure_channel(&self, spec: &ChannelSpec) -> Result<(), SinkError> {
        self.channels.lock().unwrap().push(spec.clone());
        Ok(())
    }
}
