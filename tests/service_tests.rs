use approx::assert_relative_eq;
use ndarray::{Array1, ArrayView2};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tx_confirmation_eta::error::Result;
use tx_confirmation_eta::models::{Regressor, ScalerArtifact};
use tx_confirmation_eta::{PredictionError, PredictionService, TransactionFeatures};

/// Sums each row and counts how often it was called
#[derive(Default)]
struct CountingSumModel {
    calls: Arc<AtomicUsize>,
}

impl Regressor for CountingSumModel {
    fn name(&self) -> &str {
        "counting-sum"
    }

    fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(rows.rows().into_iter().map(|r| r.sum()).collect())
    }
}

fn service_with_calls() -> (PredictionService, Arc<AtomicUsize>) {
    let model = CountingSumModel::default();
    let calls = model.calls.clone();
    let service =
        PredictionService::from_parts(Box::new(model), Box::new(ScalerArtifact::identity()))
            .unwrap();
    (service, calls)
}

fn reference_body() -> serde_json::Value {
    json!({
        "gas_price": 50,
        "gas_fee_cap": 60,
        "gas_tip_cap": 2,
        "gas": 21000,
        "value": 0,
        "tx_type": 2,
        "nonce": 5,
        "data_size": 0
    })
}

#[test]
fn end_to_end_reference_example() {
    let (service, calls) = service_with_calls();

    let features = TransactionFeatures::from_json(&reference_body()).unwrap();
    assert_eq!(
        service.encode(&features),
        [50.0, 21000.0, 2.0, 60.0, 0.0, 5.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]
    );

    let predicted = service.predict_json(&reference_body()).unwrap();
    assert_eq!(predicted, 21118.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_field_never_reaches_the_model() {
    let (service, calls) = service_with_calls();
    let mut body = reference_body();
    body.as_object_mut().unwrap().remove("gas_price");

    match service.predict_json(&body) {
        Err(PredictionError::Validation(v)) => assert!(v.has_field("gas_price")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn out_of_range_tx_type_still_predicts() {
    let (service, _) = service_with_calls();

    for tx_type in [-1, 5] {
        let features = TransactionFeatures::new(50.0, 60.0, 2.0, 21000, 0.0, tx_type).with_nonce(5);
        let vector = service.encode(&features);
        assert!(vector[7..].iter().all(|&v| v == 0.0));

        // No one-hot contribution, so the sum drops by one
        assert_eq!(service.predict_confirmation_time_ms(&features).unwrap(), 21117.0);
    }
}

#[test]
fn pipeline_is_deterministic() {
    let (service, _) = service_with_calls();
    let features = TransactionFeatures::new(12.5, 30.0, 1.5, 90_000, 0.25, 3)
        .with_nonce(42)
        .with_data_size(68);

    let first = service.predict_confirmation_time_ms(&features).unwrap();
    for _ in 0..10 {
        assert_eq!(service.predict_confirmation_time_ms(&features).unwrap(), first);
    }
}

#[test]
fn standard_scaler_is_inverted() {
    let scaler = ScalerArtifact::Standard {
        mean: vec![15_000.0],
        scale: Some(vec![4_000.0]),
    };

    struct Constant(f64);
    impl Regressor for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
            Ok(Array1::from_elem(rows.nrows(), self.0))
        }
    }

    let service = PredictionService::from_parts(Box::new(Constant(-0.5)), Box::new(scaler)).unwrap();
    let predicted = service.predict_json(&reference_body()).unwrap();
    assert_relative_eq!(predicted, 13_000.0, epsilon = 1e-9);
}

#[test]
fn model_failure_is_not_masked() {
    struct Broken;
    impl Regressor for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn predict_batch(&self, _rows: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
            Err(PredictionError::ModelInference("shape mismatch".to_string()))
        }
    }

    let service =
        PredictionService::from_parts(Box::new(Broken), Box::new(ScalerArtifact::identity()))
            .unwrap();
    let err = service.predict_json(&reference_body()).unwrap_err();
    assert_eq!(err.stage(), "model_inference");
}
