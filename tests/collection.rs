//! Tests for reference-counted collection of cells.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cell_network::{equality, Network, UsageError};

#[derive(Debug)]
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_deleting_output_collects_unreachable_values() {
    let net = Network::new();
    let a = net.input(2);

    let out = net.output({
        let a = a.clone();
        move |net| {
            net.value("double", {
                let a = a.clone();
                move |_| Ok(a.get()? * 2)
            })
        }
    });
    assert_eq!(net.cell_count(), 2);

    assert_eq!(out.get().unwrap(), 4);
    assert_eq!(net.cell_count(), 3);
    assert!(net.contains("double"));

    out.delete();
    assert_eq!(net.cell_count(), 1);
    assert!(!net.contains("double"));
    assert!(net.contains(a.name()));
}

#[test]
fn test_dropping_output_handle_deletes_it() {
    let net = Network::new();
    {
        let out = net.output(|net| net.value("one", |_| Ok(1)));
        assert_eq!(out.get().unwrap(), 1);
        assert_eq!(net.cell_count(), 2);
    }
    assert_eq!(net.cell_count(), 0);
}

#[test]
fn test_shared_value_survives_one_reader() {
    let net = Network::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let shared = {
        let runs = runs.clone();
        move |net: &Network| {
            let runs = runs.clone();
            net.value("shared", move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
        }
    };

    let first = net.output({
        let shared = shared.clone();
        move |net| shared(net)
    });
    let second = net.output({
        let shared = shared.clone();
        move |net| Ok(shared(net)? + 1)
    });

    assert_eq!(first.get().unwrap(), 42);
    assert_eq!(second.get().unwrap(), 43);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    first.delete();
    assert!(net.contains("shared"));
    assert_eq!(second.get().unwrap(), 43);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    second.delete();
    assert!(!net.contains("shared"));
    assert_eq!(net.cell_count(), 0);
}

#[test]
fn test_collection_cascades_through_chains() {
    let net = Network::new();
    let out = net.output(|net| {
        net.value("level1", |net| {
            net.value("level2", |net| net.value("level3", |_| Ok(3)))
        })
    });
    assert_eq!(out.get().unwrap(), 3);
    assert_eq!(
        net.cell_names(),
        vec![
            out.name().to_string(),
            "level1".to_string(),
            "level2".to_string(),
            "level3".to_string(),
        ]
    );

    drop(out);
    assert!(net.cell_names().is_empty());
}

#[test]
fn test_dropped_dependency_is_collected_on_rerun() {
    let net = Network::new();
    let pick = net.input(0usize);

    let out = net.output({
        let pick = pick.clone();
        move |net| {
            let i = pick.get()?;
            let name = format!("item{}", i);
            net.value(&name, move |_| Ok(i * 10))
        }
    });

    assert_eq!(out.get().unwrap(), 0);
    assert!(net.contains("item0"));

    pick.set(1).unwrap();
    assert_eq!(out.get().unwrap(), 10);
    assert!(net.contains("item1"));
    assert!(!net.contains("item0"));

    // recreated from scratch when needed again
    pick.set(0).unwrap();
    assert_eq!(out.get().unwrap(), 0);
    assert!(!net.contains("item1"));
}

#[test]
fn test_collected_cells_release_captures() {
    let net = Network::new();
    let drops = Arc::new(AtomicUsize::new(0));

    let out = net.output({
        let guard = Arc::new(DropCounter(drops.clone()));
        move |net| {
            let guard = guard.clone();
            net.value("guarded", move |_| Ok(format!("{:?}", guard.0.load(Ordering::SeqCst))))
        }
    });
    assert_eq!(out.get().unwrap(), "0");
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    out.delete();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_replaced_value_may_own_an_output() {
    let net = Network::new();
    let a = net.input(1);

    let holder = net.output_with_eq(
        {
            let a = a.clone();
            move |net| {
                let n = a.get()?;
                Ok(Arc::new(net.output(move |_| Ok(n * 10))))
            }
        },
        equality::ptr_eq,
    );
    assert_eq!(holder.get().unwrap().get().unwrap(), 10);
    assert_eq!(net.cell_count(), 3);

    // the old inner output is dropped with the value it belonged to
    a.set(2).unwrap();
    assert_eq!(holder.get().unwrap().get().unwrap(), 20);
    assert_eq!(net.cell_count(), 3);
    assert!(!net.is_evaluating());
}

// =============================================================================
// Deleting inputs
// =============================================================================

#[test]
fn test_deleted_input_lives_while_read() {
    let net = Network::new();
    let a = net.input(5);

    let out = net.output({
        let a = a.clone();
        move |_| a.get()
    });
    assert_eq!(out.get().unwrap(), 5);

    a.delete();
    assert!(net.contains(a.name()));
    assert_eq!(a.get().unwrap(), 5);
    a.set(6).unwrap();
    assert_eq!(out.get().unwrap(), 6);

    out.delete();
    assert!(!net.contains(a.name()));
    assert_eq!(net.cell_count(), 0);

    let err = a.get().unwrap_err();
    assert!(matches!(err.usage_error(), Some(UsageError::Collected { .. })));
    let err = a.set(7).unwrap_err();
    assert!(matches!(err.usage_error(), Some(UsageError::Collected { .. })));
}

#[test]
fn test_unread_input_is_collected_on_delete() {
    let net = Network::new();
    let a = net.input("unused");
    assert_eq!(net.cell_count(), 1);

    a.delete();
    assert_eq!(net.cell_count(), 0);
    // deleting twice is harmless
    a.delete();
}

#[test]
fn test_deleted_output_is_removed() {
    let net = Network::new();
    let out = net.output(|_| Ok(1));
    let name = out.name().to_string();

    out.delete();
    assert!(!net.contains(&name));
}
