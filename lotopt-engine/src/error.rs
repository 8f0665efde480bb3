use lotopt_db::models::Game;

/// Erreurs remontées par le moteur. Les situations dégradées (pool d'ancre vide,
/// budget de tirage épuisé) ne sont pas des erreurs : voir `batch::BatchNotes`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("champ {field} invalide : {reason}")]
    Parse { field: String, reason: String },

    #[error("{game} : tirage cible manquant (champ {field})")]
    MissingTarget { game: Game, field: String },

    #[error("état de phase introuvable pour le jeton '{token}' : {reason}")]
    StateNotFound { token: String, reason: String },

    #[error("stockage de l'état : {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn parse(field: &str, reason: impl ToString) -> Self {
        EngineError::Parse { field: field.to_string(), reason: reason.to_string() }
    }

    pub fn state_not_found(token: &str, reason: impl ToString) -> Self {
        EngineError::StateNotFound { token: token.to_string(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
