use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use notevault::backend::{BackendKind, StorageHandle};
use notevault::gate::{self, PasswordSource};
use notevault::kv_store::KvStore;
use notevault::pointer::{FilePointerStore, MemoryPointerStore, PointerStore};
use notevault::system_notes::{SystemNote, DAILY_JOURNAL_NOTE_NAME, INBOX_NOTE_NAME, SCRATCH_NOTE_NAME};
use notevault::{NoteStore, VaultError};

/// Answers password prompts from a fixed list and records what was asked.
#[derive(Default)]
struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    messages: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            messages: Mutex::new(Vec::new()),
        })
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl PasswordSource for ScriptedPrompt {
    async fn get_password(&self, message: &str) -> notevault::Result<String> {
        self.messages.lock().unwrap().push(message.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| VaultError::PasswordUnavailable("no more answers".into()))
    }
}

async fn kv_session(kv: Arc<KvStore>) -> Result<NoteStore> {
    let pointer: Arc<dyn PointerStore> = Arc::new(MemoryPointerStore::default());
    Ok(NoteStore::with_stores(kv, pointer, ScriptedPrompt::new(&[])).await?)
}

async fn dir_session(dir: &Path, prompt: Arc<ScriptedPrompt>) -> Result<NoteStore> {
    let pointer: Arc<dyn PointerStore> =
        Arc::new(MemoryPointerStore::new(StorageHandle::directory(dir)));
    Ok(NoteStore::with_stores(Arc::new(KvStore::in_memory()), pointer, prompt).await?)
}

#[tokio::test]
async fn test_kv_create_list_read_delete() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;

    // first run creates the default notes
    let mut names = store.names();
    names.sort();
    assert_eq!(names, vec![DAILY_JOURNAL_NOTE_NAME, INBOX_NOTE_NAME, SCRATCH_NOTE_NAME]);

    store.create_note("todo", "- buy milk").await?;
    assert!(store.names().contains(&"todo".to_string()));
    assert_eq!(store.load_note("todo").await?, "- buy milk");

    store.delete_note("todo").await?;
    assert!(!store.note_exists("todo"));
    assert!(matches!(
        store.load_note("todo").await,
        Err(VaultError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_create_existing_name_is_refused() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    store.create_note("todo", "one").await?;

    let err = store.create_note("todo", "two").await.unwrap_err();
    assert!(matches!(err, VaultError::NameTaken(_)));
    assert_eq!(store.create_if_not_exists("todo", "two").await?, 0);
    assert_eq!(store.load_note("todo").await?, "one");
    Ok(())
}

#[tokio::test]
async fn test_directory_write_read_with_escaped_name() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    assert_eq!(store.backend_kind().await, BackendKind::Directory);

    store.save_note("a/b: c?", "tricky").await?;
    assert!(dir.join("a%2Fb%3A c%3F.edna.txt").exists());
    assert!(store.note_exists("a/b: c?"));

    // a new session sees the same note under its logical name
    let reopened = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    assert_eq!(reopened.load_note("a/b: c?").await?, "tricky");
    Ok(())
}

#[tokio::test]
async fn test_kv_session_survives_reopen() -> Result<()> {
    let tmp = TempDir::new()?;
    let kv_path = tmp.path().join("kv.json");
    let state_path = tmp.path().join("state.json");

    {
        let store = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
        store.create_note("todo", "- buy milk").await?;
    }

    let store = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
    assert_eq!(store.backend_kind().await, BackendKind::KeyValue);
    assert_eq!(store.load_note("todo").await?, "- buy milk");
    Ok(())
}

#[tokio::test]
async fn test_migration_keeps_both_versions_and_switches_pointer() -> Result<()> {
    let tmp = TempDir::new()?;
    let kv_path = tmp.path().join("kv.json");
    let state_path = tmp.path().join("state.json");
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("todo.edna.txt"), "- old item")?;

    let store = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
    store.create_note("todo", "- buy milk").await?;

    let report = store.migrate_to(StorageHandle::directory(&dir)).await?;
    assert_eq!(report.renamed(), 1);
    assert_eq!(store.backend_kind().await, BackendKind::Directory);
    assert_eq!(store.load_note("todo").await?, "- old item");
    assert_eq!(store.load_note("todo-1").await?, "- buy milk");
    assert!(dir.join("todo-1.edna.txt").exists());

    // the key-value store no longer holds notes
    let kv = store.kv_store().clone();
    assert!(kv.keys().await.iter().all(|k| !k.starts_with("note")));

    // the pointer was persisted, so the next session opens the directory
    let pointer = FilePointerStore::new(&state_path);
    assert_eq!(pointer.get().await?, StorageHandle::directory(fs::canonicalize(&dir)?));
    drop(store);
    let reopened = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
    assert_eq!(reopened.backend_kind().await, BackendKind::Directory);
    assert!(reopened.note_exists("todo-1"));
    Ok(())
}

#[tokio::test]
async fn test_migration_back_to_kv_clears_pointer() -> Result<()> {
    let tmp = TempDir::new()?;
    let kv_path = tmp.path().join("kv.json");
    let state_path = tmp.path().join("state.json");
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;

    let store = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
    store.create_note("ideas", "fly").await?;
    store.migrate_to(StorageHandle::directory(&dir)).await?;

    let err = store
        .migrate_to(StorageHandle::directory(&dir))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Storage(_)));

    store.migrate_to(StorageHandle::key_value()).await?;
    assert_eq!(store.backend_kind().await, BackendKind::KeyValue);
    assert_eq!(store.load_note("ideas").await?, "fly");
    assert!(!state_path.exists());
    assert!(!dir.join("ideas.edna.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_current_note_follows_rename_and_delete() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    assert_eq!(store.current_note(), SCRATCH_NOTE_NAME);

    store.create_note("draft", "").await?;
    store.set_current_note("draft");
    store.rename_note("draft", "final").await?;
    assert_eq!(store.current_note(), "final");

    store.delete_note("final").await?;
    assert_eq!(store.current_note(), SCRATCH_NOTE_NAME);
    Ok(())
}

#[tokio::test]
async fn test_rename_errors() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    store.create_note("a", "1").await?;
    store.create_note("b", "2").await?;

    assert!(matches!(
        store.rename_note("a", "b").await,
        Err(VaultError::NameTaken(_))
    ));
    assert!(matches!(
        store.rename_note("missing", "c").await,
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        store.rename_note(SCRATCH_NOTE_NAME, "c").await,
        Err(VaultError::Protected(_))
    ));
    assert_eq!(store.load_note("b").await?, "2");
    Ok(())
}

#[tokio::test]
async fn test_scratch_and_system_notes_are_protected() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;

    assert!(matches!(
        store.delete_note(SCRATCH_NOTE_NAME).await,
        Err(VaultError::Protected(_))
    ));
    assert!(store.note_exists(SCRATCH_NOTE_NAME));

    let help = SystemNote::Help.name();
    assert!(matches!(store.delete_note(help).await, Err(VaultError::Protected(_))));
    assert!(!store.load_note(help).await?.is_empty());

    // saving a system note is a no-op
    store.save_note(help, "overwritten").await?;
    assert_ne!(store.load_note(help).await?, "overwritten");
    assert!(!store.names().iter().any(|n| n == help));
    Ok(())
}

#[tokio::test]
async fn test_new_scratch_notes_get_unique_names() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    assert_eq!(store.create_new_scratch_note().await?, "scratch-1");
    assert_eq!(store.create_new_scratch_note().await?, "scratch-2");
    assert_eq!(store.load_note("scratch-2").await?, "");
    Ok(())
}

#[tokio::test]
async fn test_encrypt_all_then_decrypt_all() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    store.create_note("diary", "dear diary").await?;

    let converted = store.encrypt_all_notes("hunter2").await?;
    assert_eq!(converted, store.note_count());
    assert!(store.is_using_encryption().await);
    assert!(store.is_encrypted("diary"));
    assert!(dir.join("diary.encr.edna.txt").exists());
    assert!(!dir.join("diary.edna.txt").exists());
    assert_ne!(fs::read(dir.join("diary.encr.edna.txt"))?, b"dear diary");
    assert_eq!(store.load_note("diary").await?, "dear diary");

    // notes created while encryption is on are encrypted too
    store.create_note("secret", "psst").await?;
    assert!(store.is_encrypted("secret"));

    let converted = store.decrypt_all_notes().await?;
    assert_eq!(converted, store.note_count());
    assert!(store.encrypted_names().is_empty());
    assert!(!store.is_using_encryption().await);
    assert_eq!(fs::read_to_string(dir.join("diary.edna.txt"))?, "dear diary");
    Ok(())
}

#[tokio::test]
async fn test_rename_preserves_encryption() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    store.create_note("plans", "world domination").await?;
    store.encrypt_all_notes("pw").await?;

    store.rename_note("plans", "ideas").await?;
    assert!(store.is_encrypted("ideas"));
    assert!(!store.note_exists("plans"));
    assert_eq!(store.load_note("ideas").await?, "world domination");
    Ok(())
}

#[tokio::test]
async fn test_remembered_password_and_retry_after_wrong_one() -> Result<()> {
    let kv = Arc::new(KvStore::in_memory());
    {
        let store = kv_session(kv.clone()).await?;
        store.create_note("diary", "dear diary").await?;
        store.encrypt_all_notes("right").await?;
    }

    // remembered password: no prompt needed
    let prompt = ScriptedPrompt::new(&[]);
    let pointer: Arc<dyn PointerStore> = Arc::new(MemoryPointerStore::default());
    let store = NoteStore::with_stores(kv.clone(), pointer, prompt.clone()).await?;
    assert_eq!(store.load_note("diary").await?, "dear diary");
    assert!(prompt.messages().is_empty());
    drop(store);

    // forgotten password: prompt, reject the wrong one, ask again
    kv.remove(gate::REMEMBERED_PASSWORD_KEY).await?;
    let prompt = ScriptedPrompt::new(&["wrong", "right"]);
    let pointer: Arc<dyn PointerStore> = Arc::new(MemoryPointerStore::default());
    let store = NoteStore::with_stores(kv.clone(), pointer, prompt.clone()).await?;
    assert_eq!(store.load_note("diary").await?, "dear diary");
    assert_eq!(
        prompt.messages(),
        vec![gate::PROMPT_ENTER_PASSWORD, gate::PROMPT_WRONG_PASSWORD]
    );
    assert_eq!(
        kv.get(gate::REMEMBERED_PASSWORD_KEY).await.as_deref(),
        Some("right")
    );
    Ok(())
}

#[tokio::test]
async fn test_abandoned_password_prompt_fails_the_read() -> Result<()> {
    let kv = Arc::new(KvStore::in_memory());
    {
        let store = kv_session(kv.clone()).await?;
        store.create_note("diary", "dear diary").await?;
        store.encrypt_all_notes("right").await?;
    }
    kv.remove(gate::REMEMBERED_PASSWORD_KEY).await?;

    let store = kv_session(kv).await?;
    assert!(matches!(
        store.load_note("diary").await,
        Err(VaultError::PasswordUnavailable(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_repair_file_names_on_open() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("what?.edna.txt"), "question")?;
    fs::write(dir.join("50%.edna.txt"), "half")?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    assert!(dir.join("what%3F.edna.txt").exists());
    assert!(!dir.join("what?.edna.txt").exists());
    assert!(dir.join("50%25.edna.txt").exists());
    assert_eq!(store.load_note("what?").await?, "question");
    assert_eq!(store.load_note("50%").await?, "half");

    // already canonical: nothing to do
    assert_eq!(store.repair_file_names().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_unrelated_files_are_ignored() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(dir.join("sub.edna.txt"))?;
    fs::write(dir.join("readme.md"), "not a note")?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    let mut names = store.names();
    names.sort();
    assert_eq!(names, vec![DAILY_JOURNAL_NOTE_NAME, INBOX_NOTE_NAME, SCRATCH_NOTE_NAME]);
    Ok(())
}

#[tokio::test]
async fn test_removed_directory_is_unavailable() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    fs::remove_dir_all(&dir)?;

    assert!(matches!(
        store.load_note(INBOX_NOTE_NAME).await,
        Err(VaultError::BackendUnavailable(_))
    ));
    assert!(matches!(
        store.save_note("new", "x").await,
        Err(VaultError::BackendUnavailable(_))
    ));
    assert!(matches!(
        dir_session(&dir, ScriptedPrompt::new(&[])).await,
        Err(e) if e.to_string().contains("unavailable")
    ));
    Ok(())
}

#[tokio::test]
async fn test_preload_counts_note_files() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    store.create_note("one", "1").await?;
    assert_eq!(store.preload_all_notes().await?, store.note_count());

    let kv_store = kv_session(Arc::new(KvStore::in_memory())).await?;
    assert_eq!(kv_store.preload_all_notes().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_use_directory_switches_without_moving() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("other");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("existing.edna.txt"), "already here")?;

    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    store.create_note("kv-only", "stays behind").await?;

    let names = store.use_directory(&dir).await?;
    assert!(names.contains(&"existing".to_string()));
    assert!(!names.contains(&"kv-only".to_string()));
    // scratch is always present
    assert!(names.contains(&SCRATCH_NOTE_NAME.to_string()));
    assert_eq!(store.load_note("existing").await?, "already here");
    Ok(())
}

#[tokio::test]
async fn test_stats_count_events() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    let base = store.stats();
    assert_eq!(base.created, 3);

    store.create_note("a", "").await?;
    store.save_note("a", "text").await?;
    store.rename_note("a", "b").await?;
    store.delete_note("b").await?;

    let stats = store.stats();
    assert_eq!(stats.created, base.created + 1);
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.renamed, 1);
    assert_eq!(stats.deleted, 1);
    Ok(())
}

#[tokio::test]
async fn test_stats_ignore_missing_deletes_and_count_saved_creates() -> Result<()> {
    let store = kv_session(Arc::new(KvStore::in_memory())).await?;
    let base = store.stats();

    store.delete_note("never-existed").await?;
    assert_eq!(store.stats().deleted, 0);

    store.save_note("fresh", "from write").await?;
    store.save_note("fresh", "again").await?;
    let stats = store.stats();
    assert_eq!(stats.created, base.created + 1);
    assert_eq!(stats.saved, 2);
    Ok(())
}

#[tokio::test]
async fn test_migration_to_alias_of_active_directory_is_refused() -> Result<()> {
    let tmp = TempDir::new()?;
    let kv_path = tmp.path().join("kv.json");
    let state_path = tmp.path().join("state.json");
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;
    fs::create_dir_all(tmp.path().join("other"))?;

    let store = NoteStore::open(&kv_path, &state_path, ScriptedPrompt::new(&[])).await?;
    store.create_note("todo", "- buy milk").await?;
    store.migrate_to(StorageHandle::directory(&dir)).await?;

    let alias = tmp.path().join("other").join("..").join("notes");
    let err = store
        .migrate_to(StorageHandle::directory(&alias))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Storage(_)));

    assert_eq!(store.backend_kind().await, BackendKind::Directory);
    assert_eq!(store.load_note("todo").await?, "- buy milk");
    assert!(dir.join("todo.edna.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_invalid_utf8_note_file_still_migrates_to_kv() -> Result<()> {
    let tmp = TempDir::new()?;
    let dir = tmp.path().join("notes");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("latin.edna.txt"), b"caf\xe9")?;

    let store = dir_session(&dir, ScriptedPrompt::new(&[])).await?;
    assert_eq!(store.load_note("latin").await?, "caf\u{FFFD}");

    store.migrate_to(StorageHandle::key_value()).await?;
    assert_eq!(store.backend_kind().await, BackendKind::KeyValue);
    assert_eq!(store.load_note("latin").await?, "caf\u{FFFD}");
    assert!(!dir.join("latin.edna.txt").exists());
    Ok(())
}
