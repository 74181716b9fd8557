use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use storage::{CredentialPrompt, CredentialStore, Storage, COMPUTE_API_KEY};

struct CountingPrompt {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl CountingPrompt {
    fn answering(answer: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialPrompt for CountingPrompt {
    fn prompt(&self, _label: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

async fn file_storage(dir: &tempfile::TempDir) -> Storage {
    let db_path = dir.path().join("vessel.db");
    let url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    Storage::new(&url).await.expect("db")
}

#[tokio::test]
async fn missing_key_prompts_once_and_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = file_storage(&dir).await;
    let prompt = CountingPrompt::answering(Some("secret-key"));
    let store = CredentialStore::new(storage.clone(), prompt.clone());

    let first = store.credential().await.expect("first").expect("key");
    let second = store.credential().await.expect("second").expect("key");

    assert_eq!(first.expose(), "secret-key");
    assert_eq!(second, first);
    assert_eq!(prompt.calls(), 1);

    let persisted = storage
        .load_setting(COMPUTE_API_KEY)
        .await
        .expect("load")
        .expect("persisted");
    assert_eq!(persisted.value, "secret-key");
}

#[tokio::test]
async fn persisted_key_is_reused_by_next_session_without_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let storage = file_storage(&dir).await;
        let store = CredentialStore::new(storage, CountingPrompt::answering(Some("k1")));
        store.credential().await.expect("first session");
    }

    let storage = file_storage(&dir).await;
    let prompt = CountingPrompt::answering(Some("other"));
    let store = CredentialStore::new(storage, prompt.clone());
    let key = store.credential().await.expect("second session").expect("key");

    assert_eq!(key.expose(), "k1");
    assert_eq!(prompt.calls(), 0);
}

#[tokio::test]
async fn declined_prompt_persists_nothing_and_is_not_repeated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = file_storage(&dir).await;
    let prompt = CountingPrompt::answering(None);
    let store = CredentialStore::new(storage.clone(), prompt.clone());

    assert!(store.credential().await.expect("first").is_none());
    assert!(store.credential().await.expect("second").is_none());
    assert_eq!(prompt.calls(), 1);
    assert!(storage
        .load_setting(COMPUTE_API_KEY)
        .await
        .expect("load")
        .is_none());
}

#[tokio::test]
async fn concurrent_lookups_share_a_single_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = file_storage(&dir).await;
    let prompt = CountingPrompt::answering(Some("shared"));
    let store = Arc::new(CredentialStore::new(storage, prompt.clone()));

    let a = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.credential().await }
    });
    let b = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.credential().await }
    });

    assert!(a.await.expect("join a").expect("a").is_some());
    assert!(b.await.expect("join b").expect("b").is_some());
    assert_eq!(prompt.calls(), 1);
}

#[tokio::test]
async fn forget_clears_key_and_prompts_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = file_storage(&dir).await;
    let prompt = CountingPrompt::answering(Some("again"));
    let store = CredentialStore::new(storage, prompt.clone());

    store.credential().await.expect("first");
    assert!(store.forget().await.expect("forget"));
    store.credential().await.expect("after forget");

    assert_eq!(prompt.calls(), 2);
}
