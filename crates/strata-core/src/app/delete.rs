//! Delete - active tier から artifact set を削除
//!
//! 全キーの存在を先に確認し、1 つでも無ければ何も消さずに NotFound。
//! 削除自体はベストエフォート（失敗はログと `DeleteReport::failed` に残す）。

use futures::future::join_all;
use tracing::info;

use crate::app::batch::delete_best_effort;
use crate::app::builder::App;
use crate::domain::{DeleteReport, ImageError, validate_key};

impl App {
    pub async fn delete(&self, keys: &[String]) -> Result<DeleteReport, ImageError> {
        if keys.is_empty() {
            return Err(ImageError::InvalidParameter(
                "at least one key is required".to_string(),
            ));
        }
        for key in keys {
            validate_key(key)?;
        }

        let shared = &self.shared;
        let active = shared.tiers.active();
        let present = join_all(keys.iter().map(|key| active.exists(key))).await;
        if let Some((key, _)) = keys.iter().zip(present).find(|(_, exists)| !exists) {
            return Err(ImageError::not_found(key.as_str()));
        }

        let artifacts: Vec<String> = keys
            .iter()
            .flat_map(|key| shared.keys.artifact_set(key))
            .collect();
        let outcome = delete_best_effort(active, &artifacts).await;

        shared.counters.deleted(keys.len());
        info!(
            keys = keys.len(),
            artifacts = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "images deleted"
        );
        Ok(DeleteReport {
            keys: keys.to_vec(),
            failed: outcome.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::app::testing::{TestApp, stage_file};
    use crate::domain::{ErrorKind, ImageError};

    async fn published(env: &TestApp, name: &str) -> String {
        let staged = stage_file(&env.dir, name, "PNG 500x500").await;
        let key = env.app.upload(&staged).await.unwrap().key;
        env.app.publish(&key).await.unwrap();
        key
    }

    #[tokio::test]
    async fn delete_removes_every_artifact_of_every_key() {
        let env = TestApp::new().await;
        let a = published(&env, "a.png").await;
        let b = published(&env, "b.png").await;
        let c = published(&env, "c.png").await;

        let report = env.app.delete(&[a.clone(), b.clone()]).await.unwrap();
        env.app.drain().await;

        assert_eq!(report.keys, vec![a, b]);
        assert!(report.failed.is_empty());
        let mut expected = env.app.keys().artifact_set(&c);
        expected.sort();
        assert_eq!(env.active_keys().await, expected);
        assert_eq!(env.app.counts().deleted, 2);
    }

    #[tokio::test]
    async fn one_missing_key_deletes_nothing() {
        let env = TestApp::new().await;
        let a = published(&env, "a.png").await;

        let err = env
            .app
            .delete(&[a.clone(), "01j00000000000000000000000.png".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(env.app.tiers().active().exists(&a).await);
    }

    #[tokio::test]
    async fn empty_and_malformed_requests_are_bad_input() {
        let env = TestApp::new().await;

        let err = env.app.delete(&[]).await.unwrap_err();
        assert!(matches!(err, ImageError::InvalidParameter(_)));
        let err = env.app.delete(&["..".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn missing_derivatives_do_not_fail_remote_deletes() {
        let env = TestApp::builder().remote().build().await;
        let a = published(&env, "a.png").await;
        env.app
            .tiers()
            .active()
            .delete(&env.app.keys().base_thumbnail_keys(&a)[0])
            .await
            .unwrap();

        let report = env.app.delete(&[a]).await.unwrap();
        assert!(report.failed.is_empty());
        assert!(env.active_keys().await.is_empty());
    }
}
