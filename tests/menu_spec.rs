use std::path::Path;

use shot_ledger::config::{Areas, LedgerConfig, MenuEntry};
use shot_ledger::db::Database;
use shot_ledger::host::{HostScene, SceneFile};
use shot_ledger::menu::{Invocation, MenuRegistry};
use shot_ledger::models::*;
use shot_ledger::{LedgerError, VersionLedger};
use speculate2::speculate;

fn test_config(root: &Path) -> LedgerConfig {
    let mut config = LedgerConfig::default();
    config.areas = Areas::under(root);
    config.context.entity_type = Some(SHOT_ENTITY.to_string());
    config.context.entity_code = Some("shot042".to_string());
    config
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let config = test_config(dir.path());
        let registry = MenuRegistry::resolve(&config);
        let mut ledger = VersionLedger::new(db.clone(), db.clone(), SceneFile::untitled(), config)
            .expect("Failed to create ledger");
    }

    describe "invoke" {
        it "rejects unknown actions" {
            let result = registry.invoke(&mut ledger, "version_up", &Invocation::default());
            assert!(matches!(result, Err(LedgerError::UnknownAction(_))));
        }

        it "needs a selection for snapshot_as" {
            let result = registry.invoke(&mut ledger, "snapshot_as", &Invocation::default());
            assert!(matches!(result, Err(LedgerError::SelectionRequired(_))));
            assert!(ledger.work_items().unwrap().is_empty());
        }

        it "snapshots the selected work item" {
            let message = registry
                .invoke(&mut ledger, "snapshot_as", &Invocation::with_selection("shotA_comp"))
                .expect("Invoke failed");

            assert!(message.starts_with("Snapshot saved to"));
            assert_eq!(ledger.snapshots("shotA_comp").unwrap().len(), 1);
        }

        it "publishes the work item open in the scene" {
            ledger.save("shotA_comp").unwrap();
            let invocation = Invocation {
                selection: None,
                description: Some("first pass".to_string()),
            };

            let message = registry.invoke(&mut ledger, "publish", &invocation).expect("Invoke failed");

            assert!(message.contains("v001"));
            let publishes = ledger.publishes("shotA_comp").unwrap();
            assert_eq!(publishes[0].description, "first pass");
        }

        it "syncs the frame range of the context shot" {
            db.create_record(
                NewRecord::new(SHOT_ENTITY, "shot042")
                    .field("cut_in", 1001)
                    .field("cut_out", 1100),
            )
            .unwrap();

            registry
                .invoke(&mut ledger, "sync_frame_range", &Invocation::default())
                .expect("Invoke failed");
            assert_eq!(ledger.host().current_frame_range(), FrameRange::new(1001, 1100));
        }

        it "lists the breakdown of an empty scene" {
            let message = registry
                .invoke(&mut ledger, "scene_breakdown", &Invocation::default())
                .expect("Invoke failed");
            assert_eq!(message, "No versioned inputs in the scene");
        }

        it "honours selection flags from the configuration" {
            let mut config = test_config(dir.path());
            config.menu_favourites.push(MenuEntry {
                requires_selection: true,
                ..MenuEntry::new("Save", "workfiles")
            });
            let registry = MenuRegistry::resolve(&config);

            let result = registry.invoke(&mut ledger, "save", &Invocation::default());
            assert!(matches!(result, Err(LedgerError::SelectionRequired(_))));
        }
    }
}
