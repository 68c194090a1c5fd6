use rand::RngCore;

use crate::geometry::Geometry;

const RANDOM_BYTES: usize = 32;

/// Object key of the form `<geometry>/<64 hex characters>.mp4`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct StorageKey {
    geometry: Geometry,
    id: String,
}

impl StorageKey {
    pub(crate) fn generate(geometry: Geometry) -> Self {
        let mut bytes = [0u8; RANDOM_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        StorageKey {
            geometry,
            id: hex::encode(bytes),
        }
    }

    pub(crate) fn as_path(&self) -> ::object_store::path::Path {
        ::object_store::path::Path::from(self.to_string())
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}.mp4", self.geometry, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::StorageKey;
    use crate::geometry::Geometry;

    #[test]
    fn key_layout() {
        let key = StorageKey::generate(Geometry::Portrait).to_string();

        let (prefix, file) = key.split_once('/').expect("has prefix");
        let id = file.strip_suffix(".mp4").expect("has extension");

        assert_eq!(prefix, "portrait");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn keys_are_unique() {
        let one = StorageKey::generate(Geometry::Landscape);
        let two = StorageKey::generate(Geometry::Landscape);

        assert_ne!(one, two);
    }

    #[test]
    fn object_path_matches_display() {
        let key = StorageKey::generate(Geometry::Other);

        assert_eq!(key.as_path().to_string(), key.to_string());
    }
}
