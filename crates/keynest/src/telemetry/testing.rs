// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capturing logs and metrics in unit tests.

use std::io::Write;
use std::sync::{Arc, Mutex};

use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// A meter provider whose exports stay in memory.
#[derive(Debug)]
pub(crate) struct MetricCapture {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricCapture {
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();
        Self { exporter, provider }
    }

    pub fn provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Flushes the provider and returns the attributes of every exported data point.
    ///
    /// Only the shapes keynest records are inspected: a u64 sum and an f64 histogram.
    pub fn attributes(&self) -> Vec<KeyValue> {
        self.provider.force_flush().expect("flush failed");
        let exported: Vec<ResourceMetrics> = self.exporter.get_finished_metrics().expect("export failed");

        let mut attributes = Vec::new();
        for metric in exported.iter().flat_map(ResourceMetrics::scope_metrics).flat_map(|scope| scope.metrics()) {
            match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                    attributes.extend(sum.data_points().flat_map(|point| point.attributes().cloned()));
                }
                AggregatedMetrics::F64(MetricData::Histogram(histogram)) => {
                    attributes.extend(histogram.data_points().flat_map(|point| point.attributes().cloned()));
                }
                _ => {}
            }
        }
        attributes
    }

    pub fn assert_recorded(&self, expected: &[KeyValue]) {
        let attributes = self.attributes();
        for attribute in expected {
            assert!(attributes.contains(attribute), "{attribute:?} was not recorded, got: {attributes:?}");
        }
    }
}

/// Formatted `tracing` output collected into a shared buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Installs a capturing subscriber for the current thread until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        (capture, tracing::subscriber::set_default(subscriber))
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("poisoned")).into_owned()
    }

    pub fn assert_logged(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "'{expected}' was not logged, got:\n{output}");
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().expect("poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
