//! Load Test Suite (Stress Testing)
//!
//! Many scenarios over a realistic number of output areas, registered while
//! other threads keep running the pipeline.
//! Run with: cargo test --test load_test --release

use scenario_scaler::{EngineConfig, Pipeline, ResultKey, ScaleStatus, Scenario};
use std::sync::Arc;
use std::time::Instant;

const UNITS: usize = 3_795;
const INDICATORS: [&str; 4] = ["air_quality", "house_price", "job_accessibility", "greenspace_accessibility"];

fn build(p: &Pipeline, id: &str, factor: f64) -> Scenario {
    let mut builder = Scenario::builder(id, p.index());
    for u in 0..UNITS {
        let unit = format!("E{:08}", u);
        for (i, name) in INDICATORS.iter().enumerate() {
            builder.push_value(name, &unit, (u + i) as f64 * factor);
        }
    }
    builder.build()
}

#[test]
fn test_many_scenarios_throughput() {
    let p = Pipeline::new(&EngineConfig::default());
    p.set_reference(build(&p, "baseline", 1.0)).unwrap();

    let count = 24;
    for s in 0..count {
        p.add_scenario(build(&p, &format!("scenario_{}", s), 1.0 + s as f64 / 10.0))
            .unwrap();
    }

    println!("\n🏋️  SCALING STRESS: {} scenarios x {} units x {} indicators", count, UNITS, INDICATORS.len());
    let start = Instant::now();
    let results = p.run().unwrap();
    let duration = start.elapsed();
    println!("   -> Time: {:.2?}", duration);

    assert_eq!(results.len(), count * INDICATORS.len());
    let sample = &results[&ResultKey::new("scenario_5", "house_price")];
    assert_eq!(sample.len(), UNITS);
    // Unit 0 reads 0.0 for air_quality in the reference
    let air = &results[&ResultKey::new("scenario_5", "air_quality")];
    assert_eq!(air[0].status, ScaleStatus::DegenerateReference);
    assert!(air[1..].iter().all(|v| v.status == ScaleStatus::Ok));
    assert!((air[1].scaled_value.unwrap() - 1.5).abs() < 1e-12);

    // Second run is served from the cache
    let start = Instant::now();
    let again = p.run().unwrap();
    println!("   -> Cached rerun: {:.2?}", start.elapsed());
    assert_eq!(again.len(), results.len());
}

#[test]
fn test_registration_during_runs() {
    let p = Arc::new(Pipeline::new(&EngineConfig::default()));
    p.set_reference(build(&p, "baseline", 1.0)).unwrap();

    let writer = {
        let p = p.clone();
        std::thread::spawn(move || {
            for s in 0..12 {
                p.add_scenario(build(&p, &format!("late_{}", s), 2.0)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let p = p.clone();
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let results = p.run().unwrap();
                    // Every visible scenario is complete: all indicators, all units
                    for values in results.values() {
                        assert_eq!(values.len(), UNITS);
                    }
                    assert_eq!(results.len() % INDICATORS.len(), 0);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    let results = p.run().unwrap();
    assert_eq!(results.len(), 12 * INDICATORS.len());
}
