use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::Rng;

use crate::error::{EngineError, Result};

use super::state::{PhaseKind, PhaseState, StateToken};

/// Stockage des états entre phases, injecté dans l'orchestrateur.
pub trait PhaseStore {
    fn save(&self, state: &PhaseState) -> Result<StateToken>;
    fn load(&self, token: &StateToken) -> Result<PhaseState>;
}

/// `AAAAMMJJ-HHMMSS-<phase>-<4 hex>`
fn new_token(kind: PhaseKind) -> StateToken {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let salt: u16 = rand::rng().random();
    StateToken(format!("{}-{}-{:04x}", stamp, kind.code(), salt))
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<StateToken, PhaseState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PhaseStore for MemoryStore {
    fn save(&self, state: &PhaseState) -> Result<StateToken> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| EngineError::Store("verrou du stockage mémoire empoisonné".into()))?;
        let mut token = new_token(state.kind());
        while states.contains_key(&token) {
            token = new_token(state.kind());
        }
        states.insert(token.clone(), state.clone());
        Ok(token)
    }

    fn load(&self, token: &StateToken) -> Result<PhaseState> {
        let states = self
            .states
            .lock()
            .map_err(|_| EngineError::Store("verrou du stockage mémoire empoisonné".into()))?;
        states
            .get(token)
            .cloned()
            .ok_or_else(|| EngineError::state_not_found(token.as_str(), "jeton inconnu"))
    }
}

/// Un fichier JSON par état : `<dir>/state_<jeton>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, token: &StateToken) -> Result<PathBuf> {
        let valid = !token.0.is_empty()
            && token.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(EngineError::state_not_found(token.as_str(), "jeton mal formé"));
        }
        Ok(self.dir.join(format!("state_{}.json", token)))
    }

    /// Jetons les plus récents d'abord.
    pub fn recent(&self, limit: usize) -> Result<Vec<StateToken>> {
        let mut tokens: Vec<StateToken> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let token = name.strip_prefix("state_")?.strip_suffix(".json")?;
                Some(StateToken(token.to_string()))
            })
            .collect();
        tokens.sort_by(|a, b| b.cmp(a));
        tokens.truncate(limit);
        Ok(tokens)
    }
}

impl PhaseStore for JsonDirStore {
    fn save(&self, state: &PhaseState) -> Result<StateToken> {
        let mut token = new_token(state.kind());
        let mut path = self.path_for(&token)?;
        while path.exists() {
            token = new_token(state.kind());
            path = self.path_for(&token)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&path, json)?;
        log::debug!("État {} écrit dans {}", token, path.display());
        Ok(token)
    }

    fn load(&self, token: &StateToken) -> Result<PhaseState> {
        let path = self.path_for(token)?;
        if !path.exists() {
            return Err(EngineError::state_not_found(token.as_str(), format!("{} absent", path.display())));
        }
        let json = std::fs::read_to_string(&path)?;
        serde_json::from_str(&json).map_err(|e| EngineError::state_not_found(token.as_str(), e))
    }
}
