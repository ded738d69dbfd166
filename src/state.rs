use crate::services::engine::Engine;

pub struct AppState {
    pub engine: Engine,
}
