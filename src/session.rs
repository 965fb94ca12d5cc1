use egui::Color32;

// ── Palette ─────────────────────────────────────────────────────────────────

/// The fixed set of selectable colors, in creation-cycling order.
pub const PALETTE: [(&str, Color32); 8] = [
    ("red", Color32::from_rgb(255, 0, 0)),
    ("blue", Color32::from_rgb(0, 0, 255)),
    ("green", Color32::from_rgb(0, 128, 0)),
    ("purple", Color32::from_rgb(128, 0, 128)),
    ("orange", Color32::from_rgb(255, 165, 0)),
    ("cyan", Color32::from_rgb(0, 255, 255)),
    ("magenta", Color32::from_rgb(255, 0, 255)),
    ("yellow", Color32::from_rgb(255, 255, 0)),
];

// ── Session ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct AnnotationObject {
    pub name: String,
    slot: usize,
    points: Vec<(f32, f32)>,
}

impl AnnotationObject {
    pub fn color(&self) -> Color32 {
        PALETTE[self.slot].1
    }

    pub fn color_name(&self) -> &'static str {
        PALETTE[self.slot].0
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }
}

/// All annotation state for one decoded frame: the object registry and the
/// single active object receiving new points. Discarded whenever a new frame
/// is opened.
#[derive(Clone, Debug)]
pub struct AnnotationSession {
    width: u32,
    height: u32,
    objects: Vec<AnnotationObject>,
    active: Option<usize>,
}

impl AnnotationSession {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            objects: Vec::new(),
            active: None,
        }
    }

    /// Creates `object{N}` with the next palette color and makes it active.
    pub fn add_object(&mut self) -> usize {
        // Objects are never removed, so the registry index doubles as the
        // creation rank.
        let rank = self.objects.len();
        self.objects.push(AnnotationObject {
            name: format!("object{}", rank + 1),
            slot: rank % PALETTE.len(),
            points: Vec::new(),
        });
        self.active = Some(rank);
        rank
    }

    pub fn objects(&self) -> &[AnnotationObject] {
        &self.objects
    }

    pub fn name_mut(&mut self, index: usize) -> &mut String {
        &mut self.objects[index].name
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_object(&self) -> Option<&AnnotationObject> {
        self.active.map(|index| &self.objects[index])
    }

    pub fn select(&mut self, index: usize) {
        if index < self.objects.len() {
            self.active = Some(index);
        }
    }

    /// Recolors an object, accepting only names from the palette
    /// (case-insensitive). Anything else leaves the object untouched.
    pub fn set_color_by_name(&mut self, index: usize, name: &str) -> bool {
        let Some(slot) = PALETTE
            .iter()
            .position(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        else {
            return false;
        };
        match self.objects.get_mut(index) {
            Some(object) => {
                object.slot = slot;
                true
            }
            None => false,
        }
    }

    /// Appends a point to the active object. Ignored when no object is
    /// active or the coordinates fall outside the frame.
    pub fn click(&mut self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return false;
        }
        let Some(index) = self.active else {
            return false;
        };
        self.objects[index].points.push((x, y));
        true
    }

    /// Empties the active object's points; every other object keeps its own.
    pub fn clear_active(&mut self) -> bool {
        match self.active {
            Some(index) => {
                self.objects[index].points.clear();
                true
            }
            None => false,
        }
    }

    pub fn has_points(&self) -> bool {
        self.objects.iter().any(|object| !object.points.is_empty())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_created_object_is_active() {
        let mut session = AnnotationSession::new(640, 480);
        let a = session.add_object();
        let b = session.add_object();
        let c = session.add_object();
        assert_eq!(session.active_index(), Some(c));
        assert_ne!(session.active_index(), Some(a));
        assert_ne!(session.active_index(), Some(b));
    }

    #[test]
    fn selecting_activates_exactly_that_object() {
        let mut session = AnnotationSession::new(640, 480);
        let a = session.add_object();
        session.add_object();
        session.select(a);
        assert_eq!(session.active_index(), Some(a));

        // Out-of-range selection changes nothing.
        session.select(99);
        assert_eq!(session.active_index(), Some(a));
    }

    #[test]
    fn clicks_go_to_the_active_object_only() {
        let mut session = AnnotationSession::new(640, 480);
        let cat = session.add_object();
        *session.name_mut(cat) = "cat".to_string();
        assert!(session.click(120.0, 80.0));
        assert!(session.click(200.0, 40.0));

        let dog = session.add_object();
        *session.name_mut(dog) = "dog".to_string();
        assert!(session.click(10.0, 10.0));

        assert_eq!(session.objects()[cat].points(), &[(120.0, 80.0), (200.0, 40.0)]);
        assert_eq!(session.objects()[dog].points(), &[(10.0, 10.0)]);
    }

    #[test]
    fn clear_only_empties_the_active_object() {
        let mut session = AnnotationSession::new(640, 480);
        let cat = session.add_object();
        session.click(120.0, 80.0);
        let dog = session.add_object();
        session.click(10.0, 10.0);

        session.select(cat);
        assert!(session.clear_active());

        assert!(session.objects()[cat].points().is_empty());
        assert_eq!(session.objects()[dog].points(), &[(10.0, 10.0)]);
        // The cleared object keeps its identity.
        assert_eq!(session.objects()[cat].name, "object1");
    }

    #[test]
    fn clicks_without_active_object_or_outside_bounds_are_ignored() {
        let mut session = AnnotationSession::new(100, 100);
        assert!(!session.click(10.0, 10.0));

        session.add_object();
        assert!(!session.click(-1.0, 10.0));
        assert!(!session.click(10.0, 100.0));
        assert!(!session.click(100.0, 10.0));
        assert!(session.objects()[0].points().is_empty());
        assert!(!session.has_points());
    }

    #[test]
    fn palette_cycles_by_creation_rank() {
        let mut session = AnnotationSession::new(10, 10);
        for _ in 0..10 {
            session.add_object();
        }
        assert_eq!(session.objects()[0].color_name(), "red");
        assert_eq!(session.objects()[7].color_name(), "yellow");
        assert_eq!(session.objects()[8].color_name(), "red");
        assert_eq!(session.objects()[9].color_name(), "blue");
    }

    #[test]
    fn color_override_is_restricted_to_the_palette() {
        let mut session = AnnotationSession::new(10, 10);
        let index = session.add_object();
        assert!(session.set_color_by_name(index, "BLUE"));
        assert_eq!(session.objects()[index].color_name(), "blue");

        assert!(!session.set_color_by_name(index, "teal"));
        assert!(!session.set_color_by_name(index, ""));
        assert_eq!(session.objects()[index].color_name(), "blue");
    }
}
