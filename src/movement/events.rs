use bevy::prelude::*;

use super::components::BodyIndex;

/// Set (`Some`) or clear (`None`) the destination of one body.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    pub body: BodyIndex,
    pub target: Option<Vec2>,
}
