use gloo::storage::{LocalStorage, Storage};
use mines_core::{Amount, CellCount, GridSize, SessionStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) trait StorageKey {
    const KEY: &'static str;
}

/// LocalStorage persistence for values with a fixed key.
pub(crate) trait LocalOrDefault: Sized {
    fn local_or_default() -> Self;
    fn local_save(&self);
}

impl<T> LocalOrDefault for T
where
    T: StorageKey + Default + Serialize + DeserializeOwned,
{
    fn local_or_default() -> Self {
        LocalStorage::get(T::KEY).unwrap_or_else(|err| {
            log::debug!("no stored {}: {}", T::KEY, err);
            T::default()
        })
    }

    fn local_save(&self) {
        if let Err(err) = LocalStorage::set(T::KEY, self) {
            log::error!("failed to save {}: {}", T::KEY, err);
        }
    }
}

/// Table settings the player chose last time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Preferences {
    pub grid: Option<GridSize>,
    pub mines: Option<CellCount>,
    pub stake: Option<Amount>,
}

impl StorageKey for Preferences {
    const KEY: &'static str = "mines:prefs:v1";
}

impl Preferences {
    pub(crate) fn capture(store: &SessionStore) -> Self {
        Self {
            grid: Some(store.grid()),
            mines: Some(store.mine_count()),
            stake: Some(store.stake()),
        }
    }

    /// Applies what still fits the table; anything rejected keeps the default.
    pub(crate) fn apply(&self, store: &SessionStore) {
        if let Some(grid) = self.grid
            && let Err(err) = store.set_grid(grid)
        {
            log::warn!("Ignoring stored grid {grid:?}: {err}");
        }
        if let Some(mines) = self.mines
            && let Err(err) = store.set_mine_count(mines)
        {
            log::warn!("Ignoring stored mine count {mines}: {err}");
        }
        if let Some(stake) = self.stake
            && let Err(err) = store.set_stake(stake)
        {
            log::warn!("Ignoring stored stake {stake}: {err}");
        }
    }
}
