//! Fuzz target: telemetry normalization and request parsing
//!
//! Feeds arbitrary bytes through the JSON front door and asserts that:
//! - `normalize` never panics and every metric has an entry
//! - `missing_fields` lists exactly the absent metrics
//! - present values are always finite
//! - parsed requests are decided without panicking, never above the cap
//!
//! cargo fuzz run fuzz_normalize

#![no_main]

use hivegate::firewall::{self, DecisionKind};
use hivegate::health::{self, HealthState};
use hivegate::policy::ActuationCaps;
use hivegate::telemetry::{Metric, normalize};
use hivegate::{GateConfig, Band, Bioload};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    if let Ok(t) = normalize(&value, 0) {
        assert_eq!(t.metrics.len(), Metric::ALL.len());
        for m in Metric::ALL {
            match t.get(m) {
                Some(v) => {
                    assert!(v.is_finite());
                    assert!(!t.missing_fields.contains(&m));
                }
                None => assert!(t.missing_fields.contains(&m)),
            }
        }
        let cfg = GateConfig::default();
        let _ = health::classify(&t, &cfg.band, &cfg.bioload);
    } else {
        assert!(!value.is_object());
    }

    // Treat arrays as request batches.
    if let Value::Array(items) = &value {
        if let Ok(reqs) = firewall::parse_requests(items) {
            let caps = ActuationCaps::default();
            let green = HealthState::new(Band::Green, Bioload::Nominal);
            if let Ok(decisions) = firewall::enforce(&reqs, &green, &caps, 0) {
                assert_eq!(decisions.len(), reqs.len());
                for d in decisions {
                    assert!(d.modified_magnitude <= caps.ceiling(d.request.actuator));
                    if d.kind == DecisionKind::Deny {
                        assert_eq!(d.modified_magnitude, 0.0);
                    }
                }
            }
        }
    }
});
