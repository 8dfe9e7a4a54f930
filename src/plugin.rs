use bevy::prelude::*;

use crate::error::MazeError;
use crate::level::LevelConfig;
use crate::session::{GameSession, SessionInput};
use crate::validation;

/// Intent for the next fixed tick. One-shot requests are cleared after use.
#[derive(Resource, Default, Clone, Copy)]
pub struct PlayerInput(pub SessionInput);

/// Milliseconds on the session clock, sampled from fixed time.
#[derive(Resource, Default, Clone, Copy)]
pub struct SessionClock {
    pub now_ms: u64,
    pub delta_ms: u64,
}

/// When set, the ghost walks itself to the exit.
#[derive(Resource, Default, Clone, Copy)]
pub struct Autopilot(pub bool);

#[derive(Resource, Default)]
pub struct RunLimit {
    pub max_ticks: Option<u64>,
    pub ticks: u64,
}

pub struct GhostMazePlugin;

impl Plugin for GhostMazePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .init_resource::<PlayerInput>()
            .init_resource::<SessionClock>()
            .init_resource::<Autopilot>()
            .init_resource::<RunLimit>()
            .add_systems(Startup, start_session)
            .add_systems(
                FixedUpdate,
                (
                    (advance_clock, drive_autopilot, tick_session, log_session_events)
                        .chain()
                        .run_if(resource_exists::<GameSession>),
                    finish_run,
                )
                    .chain(),
            );
    }
}

fn build_session(level: &LevelConfig) -> Result<GameSession, MazeError> {
    match GameSession::from_level(level) {
        Ok(session) => Ok(session),
        Err(MazeError::GenerationFailure { attempts, reason }) => {
            warn!(
                "[GhostMaze] Generation failed after {} attempt(s) ({}); retrying with relaxed settings",
                attempts, reason
            );
            GameSession::from_level(&level.relaxed())
        }
        Err(e) => Err(e),
    }
}

fn start_session(mut commands: Commands, level: Res<LevelConfig>) {
    match build_session(&level) {
        Ok(session) => {
            let maze = session.maze();
            let stats = validation::maze_stats(maze);
            info!(
                "[GhostMaze] Level '{}' ready: {}x{} on {} layer(s), {} collectible(s), {} puzzle(s), solution {} steps, {} dead end(s)",
                session.level_id,
                maze.width,
                maze.height,
                maze.layer_count(),
                maze.collectibles.len(),
                session.puzzles().len(),
                stats.solution_length.unwrap_or(0),
                stats.dead_ends
            );
            commands.insert_resource(session);
        }
        Err(e) => error!("[GhostMaze] Could not start level '{}': {}", level.level_id, e),
    }
}

fn advance_clock(time: Res<Time>, mut clock: ResMut<SessionClock>) {
    let now_ms = time.elapsed().as_millis() as u64;
    clock.delta_ms = now_ms.saturating_sub(clock.now_ms);
    clock.now_ms = now_ms;
}

fn drive_autopilot(
    autopilot: Res<Autopilot>,
    clock: Res<SessionClock>,
    session: Res<GameSession>,
    mut input: ResMut<PlayerInput>,
) {
    if autopilot.0 && !session.is_complete() {
        input.0.direction = session.autopilot_direction(clock.delta_ms);
    }
}

fn tick_session(
    clock: Res<SessionClock>,
    mut input: ResMut<PlayerInput>,
    mut session: ResMut<GameSession>,
) {
    if session.is_complete() {
        return;
    }
    let report = session.tick(clock.now_ms, &input.0);
    input.0.activate = None;
    input.0.use_transition = false;
    if report.level_complete {
        info!(
            "[GhostMaze] Level '{}' complete at {} ms with {} item(s)",
            session.level_id,
            clock.now_ms,
            session.inventory().len()
        );
    }
}

fn log_session_events(mut session: ResMut<GameSession>) {
    for event in session.events.drain() {
        info!("[GhostMaze] {} {}", event.name, event.data);
    }
    if session.events.dropped_events > 0 {
        debug!(
            "[GhostMaze events] {} event(s) dropped so far",
            session.events.dropped_events
        );
    }
}

fn finish_run(
    session: Option<Res<GameSession>>,
    mut limit: ResMut<RunLimit>,
    mut exit: EventWriter<AppExit>,
) {
    limit.ticks = limit.ticks.saturating_add(1);
    match session {
        None => {
            exit.send(AppExit::error());
        }
        Some(session) if session.is_complete() => {
            exit.send(AppExit::Success);
        }
        Some(_) => {
            if limit.max_ticks.is_some_and(|max| limit.ticks >= max) {
                info!("[GhostMaze] Stopping after {} tick(s)", limit.ticks);
                exit.send(AppExit::Success);
            }
        }
    }
}
