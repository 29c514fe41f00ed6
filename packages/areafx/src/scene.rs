//! World objects that effect steps can be aimed at.
//!
//! The chain never owns objects; steps refer to them by [`ObjectId`] and the
//! targeting code looks their positions up at render time.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Handle to an object in a [`SceneObjects`] registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub usize);

/// Horizontal circular motion around a centre point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    pub centre: Vec3,
    pub radius: f32,
    /// Radians per second; negative runs clockwise seen from above.
    pub angular_speed: f32,
    pub angle: f32,
}

impl Orbit {
    fn position(&self) -> Vec3 {
        self.centre + Vec3::new(self.angle.cos() * self.radius, 0.0, self.angle.sin() * self.radius)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub position: Vec3,
    /// Non-fullscreen steps aimed at this object always use the
    /// camera-facing model quad.
    pub forces_model_polygon: bool,
    pub motion: Option<Orbit>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            forces_model_polygon: false,
            motion: None,
        }
    }

    pub fn with_model_polygon(mut self) -> Self {
        self.forces_model_polygon = true;
        self
    }

    /// Attach an orbit. The object keeps its placed position until the
    /// first `advance`.
    pub fn with_orbit(mut self, orbit: Orbit) -> Self {
        self.motion = Some(orbit);
        self
    }
}

/// Registry of world objects.
#[derive(Clone, Debug, Default)]
pub struct SceneObjects {
    objects: Vec<SceneObject>,
}

impl SceneObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// The window demo scene: a cube, two lights (one orbiting) and the five
    /// windows the demo chain is aimed at.
    pub fn window_demo() -> Self {
        let mut objects = Self::new();
        objects.add(SceneObject::new("Cube", Vec3::new(42.0, 5.0, -10.0)));
        objects.add(SceneObject::new("Light_1", Vec3::new(30.0, 10.0, 0.0)).with_orbit(Orbit {
            centre: Vec3::new(20.0, 10.0, 20.0),
            radius: 20.0,
            angular_speed: -0.7,
            angle: 0.0,
        }));
        objects.add(SceneObject::new("Light_2", Vec3::new(-70.0, 30.0, 100.0)));

        let windows = [
            ("LargeWindow", Vec3::new(10.0, 17.0, -10.0)),
            ("SmallWindow1", Vec3::new(-12.0, 17.0, 60.0)),
            ("SmallWindow2", Vec3::new(0.0, 17.0, 60.0)),
            ("SmallWindow3", Vec3::new(17.0, 17.0, 60.0)),
            ("SmallWindow4", Vec3::new(34.0, 17.0, 60.0)),
        ];
        for (name, position) in windows {
            objects.add(SceneObject::new(name, position).with_model_polygon());
        }
        objects
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0)
    }

    pub fn position(&self, id: ObjectId) -> Option<Vec3> {
        self.get(id).map(|o| o.position)
    }

    /// Look an object up by name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects.iter().position(|o| o.name == name).map(ObjectId)
    }

    pub fn set_position(&mut self, id: ObjectId, position: Vec3) -> bool {
        match self.objects.get_mut(id.0) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Step animated objects forward by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        for object in &mut self.objects {
            if let Some(orbit) = object.motion.as_mut() {
                orbit.angle += orbit.angular_speed * dt;
                object.position = orbit.position();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_demo_layout() {
        let objects = SceneObjects::window_demo();
        assert_eq!(objects.len(), 8);
        let large = objects.find("LargeWindow").unwrap();
        assert_eq!(objects.position(large), Some(Vec3::new(10.0, 17.0, -10.0)));
        assert!(objects.get(large).unwrap().forces_model_polygon);
        let cube = objects.find("Cube").unwrap();
        assert!(!objects.get(cube).unwrap().forces_model_polygon);
    }

    #[test]
    fn test_orbit_advances_light() {
        let mut objects = SceneObjects::window_demo();
        let light = objects.find("Light_1").unwrap();
        assert_eq!(objects.position(light), Some(Vec3::new(30.0, 10.0, 0.0)));

        objects.advance(1.0);
        let moved = objects.position(light).unwrap();
        assert!(((moved - Vec3::new(20.0, 10.0, 20.0)).length() - 20.0).abs() < 1e-4);
        assert!(moved.z < 20.0);
    }

    #[test]
    fn test_unknown_ids() {
        let mut objects = SceneObjects::new();
        assert!(objects.is_empty());
        assert_eq!(objects.position(ObjectId(3)), None);
        assert!(!objects.set_position(ObjectId(3), Vec3::ONE));
        assert_eq!(objects.find("Cube"), None);
    }
}
