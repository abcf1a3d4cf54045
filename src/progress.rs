use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status {
        message: String,
    },
    ConfigDone {
        index: usize,
        city: String,
        product: String,
        rows: usize,
        raw_items: usize,
    },
}

/// Status lines for the operator. Always logged; optionally forwarded to a
/// listener such as the dashboard's event stream.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl Reporter {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_channel(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.send(ProgressEvent::Status { message });
    }

    pub fn config_done(&self, index: usize, city: &str, product: &str, rows: usize, raw_items: usize) {
        info!(index, city, product, rows, raw_items, "marketplace finished");
        self.send(ProgressEvent::ConfigDone {
            index,
            city: city.to_string(),
            product: product.to_string(),
            rows,
            raw_items,
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // listener gone (client disconnected): keep scraping regardless
            let _ = tx.send(event);
        }
    }
}
