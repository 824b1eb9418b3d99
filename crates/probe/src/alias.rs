use crate::library::LibraryDir;
use crate::pipeline::SearchContext;

/// The search context to probe `library` with.
///
/// When the library's folder isn't named after the library (`mylib-2.0.0`
/// holding `MyLib`), the pipeline can't match `#include "MyLib.h"` back to it
/// by name. The returned context then carries an alias from the canonical
/// name to the folder. It lives as long as the context does, so there's
/// nothing to clean up afterwards.
///
/// A name that can't be an alias is logged and the probe goes ahead without.
pub fn resolve(base: &SearchContext, library: &LibraryDir) -> SearchContext {
    if library.folder_name == library.name {
        return base.clone();
    }
    match base.with_alias(&library.name, &library.folder) {
        Ok(search) => {
            tracing::debug!(alias = %library.name, folder = %library.folder.display(), "Aliasing library folder");
            search
        },
        Err(e) => {
            tracing::warn!(library = %library.name, error = ?e, "Could not alias library folder; probing without");
            base.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn library(name: &str, folder_name: &str) -> LibraryDir {
        LibraryDir {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            architectures: vec![],
            folder: PathBuf::from("/libraries").join(folder_name),
            folder_name: folder_name.to_string(),
        }
    }

    #[test]
    fn test_matching_folder_needs_no_alias() {
        let search = resolve(&SearchContext::default(), &library("Servo", "Servo"));
        assert!(search.aliases.is_empty());
    }

    #[test]
    fn test_mismatched_folder_is_aliased() {
        let search = resolve(&SearchContext::default(), &library("MyLib", "mylib-2.0.0"));
        assert_eq!(search.aliases.get("MyLib"), Some(&PathBuf::from("/libraries/mylib-2.0.0")));
    }

    #[test]
    fn test_unusable_name_proceeds_without_alias() {
        let search = resolve(&SearchContext::default(), &library("Some/Lib", "somelib"));
        assert!(search.aliases.is_empty());
    }
}
