use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use once_cell::sync::Lazy;
use prometheus::{Encoder, Opts, TextEncoder};

/// Register additional metrics of our own structs by using this registry instance.
static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry(prometheus::Registry::new()));

// Export special preconstructed counters for Teloxide's handlers.
pub static CMD_START_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("command_start", Opts::new("command_start_usage_total", "count of /start invocations"))
});
pub static CMD_HELP_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("command_help", Opts::new("command_help_usage_total", "count of /help invocations"))
});
pub static CMD_ANNOUNCE_COUNTER: Lazy<ComplexCommandCounters> = Lazy::new(|| {
    let opts = Opts::new("command_announce_usage_total", "count of /announce invocations and successes");
    ComplexCommandCounters {
        invoked: Counter::new("command_announce (invoked)", opts.clone().const_label("state", "invoked")),
        finished: Counter::new("command_announce (finished)", opts.const_label("state", "finished")),
    }
});
pub static CALLBACK_READ_COUNTER: Lazy<ComplexCommandCounters> = Lazy::new(|| {
    let opts = Opts::new("callback_read_usage_total", "count of Read button presses and recorded acknowledgments");
    ComplexCommandCounters {
        invoked: Counter::new("callback_read (invoked)", opts.clone().const_label("state", "invoked")),
        finished: Counter::new("callback_read (finished)", opts.const_label("state", "finished")),
    }
});

// Counters of the acknowledgment engine.
pub static ANNOUNCEMENTS_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("announcements", Opts::new("announcements_created_total", "count of created announcements"))
});
pub static ACKNOWLEDGMENTS_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("acknowledgments", Opts::new("acknowledgments_recorded_total", "count of recorded acknowledgments"))
});
pub static COMPLETIONS_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("completions", Opts::new("announcements_completed_total", "count of announcements read by all recipients"))
});
pub static REMINDERS_COUNTER: Lazy<Counter> = Lazy::new(|| {
    Counter::new("reminders", Opts::new("reminders_sent_total", "count of sent reminders"))
});


pub fn init() -> axum::Router {
    let prometheus = REGISTRY
        .register(&CMD_START_COUNTER)
        .register(&CMD_HELP_COUNTER)
        .register(&CMD_ANNOUNCE_COUNTER.invoked)
        .register(&CMD_ANNOUNCE_COUNTER.finished)
        .register(&CALLBACK_READ_COUNTER.invoked)
        .register(&CALLBACK_READ_COUNTER.finished)
        .register(&ANNOUNCEMENTS_COUNTER)
        .register(&ACKNOWLEDGMENTS_COUNTER)
        .register(&COMPLETIONS_COUNTER)
        .register(&REMINDERS_COUNTER)
        .unwrap();

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    axum::Router::new()
        .route("/metrics", get(|| async move {
            let mut buffer = vec![];
            let metrics = prometheus.gather();
            if let Err(err) = TextEncoder::new().encode(&metrics, &mut buffer) {
                log::error!("couldn't encode the metrics: {err}");
            }
            let custom_metrics = String::from_utf8_lossy(&buffer);

            metric_handle.render() + custom_metrics.as_ref()
        }))
        .layer(prometheus_layer)
}

pub struct Counter {
    inner: prometheus::Counter,
    name: String
}
pub struct ComplexCommandCounters {
    invoked: Counter,
    finished: Counter,
}
struct Registry(prometheus::Registry);

impl Counter {
    fn new(name: &str, opts: Opts) -> Counter {
        let c = prometheus::Counter::with_opts(opts)
            .unwrap_or_else(|e| panic!("unable to create {name} counter: {e}"));
        Counter { inner: c, name: name.to_string() }
    }

    pub fn inc(&self) {
        self.inner.inc()
    }
}

impl ComplexCommandCounters {
    pub fn invoked(&self) {
        self.invoked.inc()
    }

    pub fn finished(&self) {
        self.finished.inc()
    }
}

impl Registry {
    fn register(&self, counter: &Counter) -> &Self {
        self.0.register(Box::new(counter.inner.clone()))
            .unwrap_or_else(|e| panic!("unable to register the {} counter: {e}", counter.name));
        self
    }

    fn unwrap(&self) -> prometheus::Registry {
        self.0.clone()
    }
}
