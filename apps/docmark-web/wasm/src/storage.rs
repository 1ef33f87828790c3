//! localStorage persistence for the saved signature library.
//!
//! Storage being unavailable (private browsing, disabled cookies) degrades
//! to an in-memory-only library rather than an error.

use wasm_bindgen::JsValue;
use web_sys::Storage;

use docmark_core::{SavedSignature, SignatureLibrary};

const STORAGE_KEY: &str = "docmark_signatures";

fn local_storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// Load the signature library from localStorage. Missing or malformed data
/// yields an empty library.
pub fn load_library() -> SignatureLibrary {
    let json = local_storage()
        .and_then(|s| s.get_item(STORAGE_KEY).ok().flatten())
        .unwrap_or_else(|| "[]".to_string());
    SignatureLibrary::from_json(&json)
}

/// Persist the library. A write failure (quota, unavailable storage) is
/// swallowed; the in-memory library stays authoritative for the session.
pub fn store_library(library: &SignatureLibrary) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(STORAGE_KEY, &library.to_json());
    }
}

/// Save a signature and persist the updated library
pub fn save_signature(library: &mut SignatureLibrary, signature: SavedSignature) {
    library.save(signature);
    store_library(library);
}

/// Remove a signature and persist the updated library
pub fn remove_signature(library: &mut SignatureLibrary, id: &str) {
    library.remove(id);
    store_library(library);
}

/// Clear persisted signatures entirely
pub fn clear_stored(library: &mut SignatureLibrary) -> Result<(), JsValue> {
    *library = SignatureLibrary::new();
    if let Some(storage) = local_storage() {
        storage.remove_item(STORAGE_KEY)?;
    }
    Ok(())
}

// WASM-specific tests that run in a browser environment
#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn signature(name: &str) -> SavedSignature {
        SavedSignature::new(
            name.to_string(),
            "data:image/png;base64,AAAA".to_string(),
            200.0,
            80.0,
            "#000000".to_string(),
        )
    }

    #[wasm_bindgen_test]
    fn test_roundtrip_through_local_storage() {
        let mut library = SignatureLibrary::new();
        clear_stored(&mut library).unwrap();

        save_signature(&mut library, signature("mine"));
        let restored = load_library();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.all()[0].name, "mine");

        clear_stored(&mut library).unwrap();
        assert!(load_library().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_remove_persists() {
        let mut library = SignatureLibrary::new();
        clear_stored(&mut library).unwrap();

        save_signature(&mut library, signature("a"));
        let id = library.all()[0].id.clone();
        remove_signature(&mut library, &id);
        assert!(load_library().is_empty());
    }
}
