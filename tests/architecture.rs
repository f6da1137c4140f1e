//! Architecture Verification Suite
//!
//! Keeps the shared components usable across threads and the public
//! surface stable for downstream consumers.

#[cfg(test)]
mod architecture_tests {
    use scenario_scaler::alignment::Aligner;
    use scenario_scaler::loader::JsonScenarioSource;
    use scenario_scaler::pipeline::EventBus;
    use scenario_scaler::scaling::{MinMax, Ratio};
    use scenario_scaler::{Pipeline, Scenario, ScenarioStore, ScalingEngine, SpatialIndex};

    // Everything shared between registration and computation must be
    // Send + Sync.
    #[test]
    fn test_components_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<SpatialIndex>();
        assert_send_sync::<ScenarioStore>();
        assert_send_sync::<Scenario>();
        assert_send_sync::<Aligner>();
        assert_send_sync::<ScalingEngine>();
        assert_send_sync::<Pipeline>();
        assert_send_sync::<EventBus>();
        assert_send_sync::<JsonScenarioSource>();
        assert_send_sync::<Ratio>();
        assert_send_sync::<MinMax>();
    }

    // The scenario source and rule seams must stay object safe.
    #[test]
    fn test_seams_are_object_safe() {
        #[allow(dead_code)]
        fn check(
            _rule: &dyn scenario_scaler::NormalizationRule,
            _source: &dyn scenario_scaler::loader::ScenarioSource,
        ) {
        }
    }

    // A pipeline can be shared behind an Arc by many readers.
    #[test]
    fn test_pipeline_shares_across_threads() {
        use std::sync::Arc;

        let p = Arc::new(Pipeline::new(&Default::default()));
        let base = Scenario::builder("base", p.index()).value("pop", "R1", 2.0).build();
        p.set_reference(base).unwrap();
        for i in 0..4 {
            let s = Scenario::builder(format!("s{}", i), p.index())
                .value("pop", "R1", i as f64)
                .build();
            p.add_scenario(s).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let p = p.clone();
                std::thread::spawn(move || p.get_scaled_values(&format!("s{}", i), "pop").unwrap())
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            let values = h.join().unwrap();
            assert_eq!(values[0].scaled_value, Some(i as f64 / 2.0));
        }
    }
}
