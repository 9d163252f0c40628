//! End-to-end pipeline runs against an in-process analysis backend and a
//! temporary directory standing in for the user's storage.

use async_trait::async_trait;
use smile_core::analysis::{
    AnalysisError, AttributeSelection, BoolAttribute, Emotion, FaceAttributes, FaceDetail,
};
use smile_core::{DesktopEnvironment, FaceAnalysisBackend, ImageSource, Orchestrator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reports a face whose signals map to the sub-scores `[91, 50, 100]`.
struct FixedBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl FaceAnalysisBackend for FixedBackend {
    async fn detect_faces(
        &self,
        _image: &[u8],
        attributes: AttributeSelection,
    ) -> Result<FaceAttributes, AnalysisError> {
        assert_eq!(attributes, AttributeSelection::All);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FaceAttributes {
            face_details: vec![FaceDetail {
                confidence: 99.5,
                smile: Some(BoolAttribute {
                    value: true,
                    confidence: 91.0,
                }),
                emotions: vec![Emotion {
                    kind: "HAPPY".into(),
                    confidence: 50.0,
                }],
                mouth_open: Some(BoolAttribute {
                    value: true,
                    confidence: 100.0,
                }),
                ..Default::default()
            }],
        })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

const IMAGE: [u8; 10] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

#[tokio::test]
async fn test_ten_byte_image_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("capture.jpg");
    std::fs::write(&image_path, IMAGE).unwrap();

    let backend = Arc::new(FixedBackend {
        calls: AtomicUsize::new(0),
    });
    let orchestrator = Orchestrator::new(backend.clone()).with_suggested_stem("smile");
    let env = DesktopEnvironment::new(Some(dir.path().join("saved")), dir.path().join("dl"));

    let report = orchestrator
        .run(
            ImageSource::Uri {
                uri: image_path.to_string_lossy().into_owned(),
            },
            &env,
        )
        .await
        .unwrap();

    assert_eq!(report.sub_scores, vec![91.0, 50.0, 100.0]);
    assert_eq!(report.score, 80);
    assert_eq!(report.image_bytes, 10);
    assert_eq!(report.mime_type.as_deref(), Some("image/jpeg"));
    assert!(report.analysis_failure.is_none());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let saved = std::fs::read(dir.path().join("saved/smile.jpg")).unwrap();
    assert_eq!(saved, IMAGE);
}

#[tokio::test]
async fn test_legacy_environment_downloads_original_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = Arc::new(FixedBackend {
        calls: AtomicUsize::new(0),
    });
    let orchestrator = Orchestrator::new(backend);
    let env = DesktopEnvironment::new(None, dir.path().to_path_buf());

    // IMAGE, base64-encoded.
    let payload = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";
    let report = orchestrator
        .run(ImageSource::from_arg(payload, None), &env)
        .await
        .unwrap();

    assert_eq!(report.score, 80);
    assert_eq!(std::fs::read(dir.path().join("mysmile")).unwrap(), IMAGE);
}
