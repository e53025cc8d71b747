//! Frame snapshot handed to the render surface

use serde::{Deserialize, Serialize};

use crate::overlay::caption::Caption;
use crate::overlay::projectile::{EntityId, Projectile};
use crate::util::vec2::Vec2;

/// Drawable view of a live projectile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: EntityId,
    pub position: Vec2,
}

impl From<&Projectile> for ProjectileView {
    fn from(projectile: &Projectile) -> Self {
        Self {
            id: projectile.id,
            position: projectile.position,
        }
    }
}

/// Everything the render surface needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub time_ms: u64,
    pub tick: u64,
    pub celebrating: bool,
    pub dark: bool,
    pub projectiles: Vec<ProjectileView>,
    pub captions: Vec<Caption>,
}

impl OverlayFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::settings::Font;

    #[test]
    fn test_frame_json() {
        let frame = OverlayFrame {
            time_ms: 1_000,
            tick: 40,
            celebrating: true,
            dark: false,
            projectiles: vec![ProjectileView::from(&Projectile::new(4, 100.0, 60.0))],
            captions: vec![Caption::new(5, "woo".to_string(), Vec2::new(1.0, 2.0), Font::Boing)],
        };

        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["celebrating"], true);
        assert_eq!(json["projectiles"][0]["id"], 4);
        assert_eq!(json["projectiles"][0]["position"]["y"], -20.0);
        assert_eq!(json["captions"][0]["font"], "boing");
    }
}
