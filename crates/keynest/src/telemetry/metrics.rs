// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter, MeterProvider},
};

use crate::telemetry::{CacheActivity, CacheOperation, attributes};

const METER_NAME: &str = "keynest";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const EVENT_COUNT_NAME: &str = "keynest.event.count";
const OPERATION_DURATION_NAME: &str = "keynest.operation.duration";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

#[derive(Debug)]
pub(crate) struct Instruments {
    event_counter: Counter<u64>,
    operation_duration: Histogram<f64>,
}

impl Instruments {
    pub(crate) fn new(meter: &Meter) -> Self {
        Self {
            event_counter: meter
                .u64_counter(EVENT_COUNT_NAME)
                .with_description("Cache and group events")
                .with_unit("{event}")
                .build(),
            operation_duration: meter
                .f64_histogram(OPERATION_DURATION_NAME)
                .with_description("Cache and group operation duration")
                .with_unit("s")
                .build(),
        }
    }

    pub(crate) fn record(&self, name: &str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        let attrs = [
            KeyValue::new(attributes::CACHE_NAME, name.to_owned()),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
        ];

        self.event_counter.add(1, &attrs);
        self.operation_duration.record(duration.as_secs_f64(), &attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::telemetry::CacheTelemetry;
    use crate::telemetry::testing::MetricCapture;

    #[test]
    fn record_emits_name_operation_and_activity() {
        let capture = MetricCapture::new();
        let meter = create_meter(capture.provider());
        let telemetry = CacheTelemetry::with_meter(false, &meter);

        telemetry.record(
            "profiles",
            CacheOperation::Read,
            CacheActivity::Hit,
            None,
            Duration::from_millis(5),
        );

        capture.assert_recorded(&[
            KeyValue::new(attributes::CACHE_NAME, "profiles"),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, CacheOperation::Read.as_str()),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, CacheActivity::Hit.as_str()),
        ]);
    }

    #[test]
    fn invalidations_are_counted() {
        let capture = MetricCapture::new();
        let meter = create_meter(capture.provider());
        let telemetry = CacheTelemetry::with_meter(false, &meter);

        telemetry.record("users", CacheOperation::Invalidate, CacheActivity::Invalidated, None, Duration::ZERO);

        capture.assert_recorded(&[
            KeyValue::new(attributes::CACHE_NAME, "users"),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, CacheActivity::Invalidated.as_str()),
        ]);
    }
}
