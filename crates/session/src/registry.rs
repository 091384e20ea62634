//! Room tag -> game lookup shared by all handler tasks.
//!
//! Handlers for the same room can run in any order. A position update that
//! overtakes the game-start handler parks in [`GameRegistry::get_when_present`]
//! until the create lands. Removed games leave their tag behind so late events
//! for them neither wait nor bring the game back.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::SessionError;
use crate::game::{GameSession, SharedGame};

#[derive(Debug, Default)]
struct Games {
    live: HashMap<String, SharedGame>,
    finished: HashSet<String>,
}

impl Games {
    fn finished_error(&self, tag: &str) -> Option<SessionError> {
        self.finished
            .contains(tag)
            .then(|| SessionError::AlreadyFinished {
                tag: tag.to_string(),
            })
    }
}

#[derive(Debug, Default)]
pub struct GameRegistry {
    games: RwLock<Games>,
    created: Notify,
    closed: AtomicBool,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing game for `tag`, or the one built by `factory`.
    ///
    /// The flag is true when this call created it. `factory` only runs in that
    /// case. A tag that already finished is refused.
    pub async fn get_or_create<F>(
        &self,
        tag: &str,
        factory: F,
    ) -> Result<(SharedGame, bool), SessionError>
    where
        F: FnOnce() -> GameSession,
    {
        let mut games = self.games.write().await;
        if let Some(err) = games.finished_error(tag) {
            return Err(err);
        }
        if let Some(game) = games.live.get(tag) {
            return Ok((Arc::clone(game), false));
        }
        let game = Arc::new(Mutex::new(factory()));
        games.live.insert(tag.to_string(), Arc::clone(&game));
        drop(games);

        debug!(tag, "game registered");
        self.created.notify_waiters();
        Ok((game, true))
    }

    pub async fn get(&self, tag: &str) -> Option<SharedGame> {
        self.games.read().await.live.get(tag).cloned()
    }

    pub async fn contains(&self, tag: &str) -> bool {
        self.games.read().await.live.contains_key(tag)
    }

    /// True once `tag` was removed as finished.
    pub async fn is_finished(&self, tag: &str) -> bool {
        self.games.read().await.finished.contains(tag)
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.live.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.live.is_empty()
    }

    /// Suspend until `tag` is registered.
    ///
    /// Fails at once with [`SessionError::AlreadyFinished`] for a removed game.
    pub async fn get_when_present(&self, tag: &str) -> Result<SharedGame, SessionError> {
        loop {
            // Register interest before looking so a create between the check
            // and the await is not missed.
            let created = self.created.notified();
            tokio::pin!(created);
            created.as_mut().enable();

            if self.closed.load(Ordering::Acquire) {
                return Err(SessionError::Closed);
            }
            {
                let games = self.games.read().await;
                if let Some(game) = games.live.get(tag) {
                    return Ok(Arc::clone(game));
                }
                if let Some(err) = games.finished_error(tag) {
                    return Err(err);
                }
            }
            created.await;
        }
    }

    /// [`get_when_present`](Self::get_when_present) bounded by `limit`; `None` on timeout.
    pub async fn get_within(
        &self,
        tag: &str,
        limit: Duration,
    ) -> Result<Option<SharedGame>, SessionError> {
        match tokio::time::timeout(limit, self.get_when_present(tag)).await {
            Ok(found) => found.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Drop a finished game and remember its tag.
    pub async fn remove(&self, tag: &str) -> Result<SharedGame, SessionError> {
        let mut games = self.games.write().await;
        let Some(game) = games.live.get(tag) else {
            return Err(SessionError::UnknownGame {
                tag: tag.to_string(),
            });
        };
        if !game.lock().await.status().is_finished() {
            return Err(SessionError::NotFinished {
                tag: tag.to_string(),
            });
        }
        let game = games.live.remove(tag).ok_or_else(|| SessionError::UnknownGame {
            tag: tag.to_string(),
        })?;
        games.finished.insert(tag.to_string());
        drop(games);

        // Waiters for this tag now fail instead of timing out.
        self.created.notify_waiters();
        Ok(game)
    }

    /// Fail every current and future [`get_when_present`](Self::get_when_present).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.created.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameStatus;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_factory_runs_once() {
        let registry = GameRegistry::new();
        let calls = AtomicUsize::new(0);
        let factory = || {
            calls.fetch_add(1, Ordering::SeqCst);
            GameSession::new("room1", "Bot1")
        };
        let (a, created_a) = registry.get_or_create("room1", factory).await.unwrap();
        let (b, created_b) = registry
            .get_or_create("room1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                GameSession::new("room1", "other")
            })
            .await
            .unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.lock().await.owner(), "Bot1");
    }

    #[tokio::test]
    async fn test_concurrent_creates_store_one_session() {
        let registry = Arc::new(GameRegistry::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .get_or_create("room1", || GameSession::new("room1", format!("p{i}")))
                    .await
                    .unwrap()
            }));
        }
        let mut games = Vec::new();
        let mut created = 0;
        for handle in handles {
            let (game, was_created) = handle.await.unwrap();
            if was_created {
                created += 1;
            }
            games.push(game);
        }
        assert_eq!(created, 1);
        assert!(games.iter().all(|g| Arc::ptr_eq(g, &games[0])));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_create() {
        let registry = Arc::new(GameRegistry::new());
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_when_present("room1").await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        registry
            .get_or_create("room1", || GameSession::new("room1", "Bot1"))
            .await
            .unwrap();
        let game = timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(game.lock().await.tag(), "room1");
    }

    #[tokio::test]
    async fn test_waiter_ignores_other_tags() {
        let registry = GameRegistry::new();
        registry
            .get_or_create("room2", || GameSession::new("room2", "Bot1"))
            .await
            .unwrap();
        let found = registry
            .get_within("room1", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let registry = Arc::new(GameRegistry::new());
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get_when_present("room1").await })
        };
        tokio::task::yield_now().await;
        registry.close();
        let result = timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert!(matches!(result, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_remove_requires_finished() {
        let registry = GameRegistry::new();
        let (game, _) = registry
            .get_or_create("room1", || GameSession::new("room1", "Bot1"))
            .await
            .unwrap();
        game.lock().await.start();
        assert!(matches!(
            registry.remove("room1").await,
            Err(SessionError::NotFinished { .. })
        ));

        game.lock().await.finish();
        let removed = registry.remove("room1").await.unwrap();
        assert_eq!(removed.lock().await.status(), GameStatus::Finished);
        assert!(!registry.contains("room1").await);
        assert!(matches!(
            registry.remove("room1").await,
            Err(SessionError::UnknownGame { .. })
        ));
    }

    #[tokio::test]
    async fn test_finished_tag_is_not_recreated() {
        let registry = GameRegistry::new();
        let (game, _) = registry
            .get_or_create("room1", || GameSession::new("room1", "Bot1"))
            .await
            .unwrap();
        game.lock().await.finish();
        registry.remove("room1").await.unwrap();
        assert!(registry.is_finished("room1").await);

        let built = AtomicUsize::new(0);
        let again = registry
            .get_or_create("room1", || {
                built.fetch_add(1, Ordering::SeqCst);
                GameSession::new("room1", "Bot1")
            })
            .await;
        assert!(matches!(again, Err(SessionError::AlreadyFinished { .. })));
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_lookup_of_finished_game_fails_fast() {
        let registry = Arc::new(GameRegistry::new());
        let (game, _) = registry
            .get_or_create("room1", || GameSession::new("room1", "Bot1"))
            .await
            .unwrap();
        game.lock().await.finish();
        registry.remove("room1").await.unwrap();

        let found = timeout(
            Duration::from_millis(200),
            registry.get_within("room1", Duration::from_secs(30)),
        )
        .await
        .unwrap();
        assert!(matches!(found, Err(SessionError::AlreadyFinished { .. })));
    }
}
