mod common;

use anyhow::Result;
use fraud_core::artifact::{MODEL_FILE, PREPROCESSOR_FILE, SCHEMA_FILE};
use fraud_core::{
    split, AnyModel, ArtifactBundle, BoostedTrees, BoostingConfig, FraudError, FraudModel,
    FraudNet, LabeledMatrix, NetworkConfig, Preprocessor, SchemaMode, SplitOptions,
};
use std::fs;
use tempfile::TempDir;

fn trained(model: AnyModel) -> Result<(ArtifactBundle, LabeledMatrix)> {
    let records = common::transactions(400, 8, 11);
    let parts = split(&records, &SplitOptions::default())?;
    let preprocessor = Preprocessor::fit(common::schema(), &parts.train, SchemaMode::Lenient)?;
    let (x_train, y_train) = preprocessor.transform_labeled(&parts.train)?;
    let (x_test, y_test) = preprocessor.transform_labeled(&parts.test)?;
    let train = LabeledMatrix::new(x_train, y_train)?;
    let test = LabeledMatrix::new(x_test, y_test)?;

    let mut model = model;
    model.fit(&train, Some(&test))?;
    Ok((ArtifactBundle::new(model, preprocessor)?, test))
}

fn network() -> Result<AnyModel> {
    let config = NetworkConfig {
        epochs: 3,
        batch_size: 64,
        ..NetworkConfig::default()
    };
    Ok(FraudNet::new(common::FEATURES.len(), config)?.into())
}

fn trees() -> Result<AnyModel> {
    let config = BoostingConfig {
        max_epochs: 10,
        min_samples_leaf: 5,
        ..BoostingConfig::default()
    };
    Ok(BoostedTrees::new(common::FEATURES.len(), config)?.into())
}

#[test]
fn test_round_trip_is_bit_identical_for_both_variants() -> Result<()> {
    for model in [network()?, trees()?] {
        let (bundle, test) = trained(model)?;
        let dir = TempDir::new()?;
        let path = dir.path().join("bundle");
        let manifest = bundle.save(&path)?;

        let (loaded, loaded_manifest) = ArtifactBundle::load(&path, SchemaMode::Lenient)?;
        assert_eq!(loaded_manifest, manifest);
        assert_eq!(loaded.preprocessor.state(), bundle.preprocessor.state());
        assert_eq!(loaded.preprocessor.schema(), bundle.preprocessor.schema());

        let before = bundle.model.predict_proba(&test.features)?;
        let after = loaded.model.predict_proba(&test.features)?;
        let before_bits: Vec<u64> = before.iter().map(|p| p.to_bits()).collect();
        let after_bits: Vec<u64> = after.iter().map(|p| p.to_bits()).collect();
        assert_eq!(before_bits, after_bits, "{} drifted", manifest.model_kind);
    }
    Ok(())
}

#[test]
fn test_tampered_component_fails_to_load() -> Result<()> {
    let (bundle, _) = trained(trees()?)?;
    for component in [SCHEMA_FILE, PREPROCESSOR_FILE, MODEL_FILE] {
        let dir = TempDir::new()?;
        let path = dir.path().join("bundle");
        bundle.save(&path)?;

        let mut bytes = fs::read(path.join(component))?;
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(path.join(component), bytes)?;

        let err = ArtifactBundle::load(&path, SchemaMode::Lenient).unwrap_err();
        assert!(
            matches!(err, FraudError::ArtifactLoad(_)),
            "{component}: unexpected {err:?}"
        );
    }
    Ok(())
}

#[test]
fn test_missing_component_fails_to_load() -> Result<()> {
    let (bundle, _) = trained(network()?)?;
    let dir = TempDir::new()?;
    let path = dir.path().join("bundle");
    bundle.save(&path)?;
    fs::remove_file(path.join(MODEL_FILE))?;

    let err = ArtifactBundle::load(&path, SchemaMode::Lenient).unwrap_err();
    assert!(matches!(err, FraudError::ArtifactLoad(_)));
    Ok(())
}

#[test]
fn test_model_save_load_through_trait() -> Result<()> {
    let (bundle, test) = trained(trees()?)?;
    let dir = TempDir::new()?;
    let path = dir.path().join("model.bin");
    bundle.model.save(&path)?;
    let restored = AnyModel::load(&path)?;
    assert_eq!(
        restored.predict_proba(&test.features)?,
        bundle.model.predict_proba(&test.features)?
    );
    Ok(())
}
