//! A small document of variable definitions, evaluated incrementally.
//!
//! Each variable is either a constant or the sum/product of other variables.
//! Editing the document reruns only the definitions and values it affects, and
//! variables that drop out of the computation are collected.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cell_network::{Input, Network, Result, ValueFunc};

#[derive(Debug, Clone, PartialEq)]
enum VarDef {
    Constant(i64),
    Sum(Vec<String>),
    Product(Vec<String>),
}

type Document = BTreeMap<String, VarDef>;

fn inputs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn document1() -> Document {
    let mut doc = Document::new();
    doc.insert("a".into(), VarDef::Constant(3));
    doc.insert("b".into(), VarDef::Constant(4));
    doc.insert("c".into(), VarDef::Sum(inputs(&["a", "b"])));
    doc
}

// =============================================================================
// Named values
// =============================================================================

fn var_def(net: &Network, doc: &Input<Document>, name: &str) -> Result<VarDef> {
    net.value(&format!("{}-def", name), {
        let doc = doc.clone();
        let name = name.to_string();
        move |_| {
            doc.get()?
                .get(&name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("undefined variable `{}`", name).into())
        }
    })
}

fn var_value(net: &Network, doc: &Input<Document>, name: &str) -> Result<i64> {
    net.value(&format!("{}-value", name), {
        let doc = doc.clone();
        let name = name.to_string();
        move |net| match var_def(net, &doc, &name)? {
            VarDef::Constant(v) => Ok(v),
            VarDef::Sum(names) => names.iter().map(|n| var_value(net, &doc, n)).sum(),
            VarDef::Product(names) => names.iter().map(|n| var_value(net, &doc, n)).product(),
        }
    })
}

#[test]
fn test_variables_document() {
    let net = Network::new();
    let doc = net.input(document1());

    let c = net.output({
        let doc = doc.clone();
        move |net| var_value(net, &doc, "c")
    });

    assert_eq!(c.get().unwrap(), 7);
    assert!(net.contains("a-value"));

    doc.update(|mut d| {
        d.insert("a".into(), VarDef::Constant(100));
        d
    })
    .unwrap();
    assert_eq!(c.get().unwrap(), 104);

    doc.update(|mut d| {
        d.insert("c".into(), VarDef::Sum(inputs(&["b"])));
        d
    })
    .unwrap();
    assert_eq!(c.get().unwrap(), 4);
    assert!(!net.contains("a-value"));
    assert!(!net.contains("a-def"));

    c.delete();
    assert_eq!(net.cell_count(), 1);
    assert_eq!(net.cell_names(), vec![doc.name().to_string()]);
}

#[test]
fn test_unchanged_definitions_do_not_rerun() {
    let net = Network::new();
    let doc = net.input(document1());
    let b_runs = Arc::new(AtomicUsize::new(0));

    let out = net.output({
        let (doc, b_runs) = (doc.clone(), b_runs.clone());
        move |net| {
            let a = var_value(net, &doc, "a")?;
            let b = net.value("b-doubled", {
                let (doc, b_runs) = (doc.clone(), b_runs.clone());
                move |net| {
                    b_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(var_value(net, &doc, "b")? * 2)
                }
            })?;
            Ok(a + b)
        }
    });

    assert_eq!(out.get().unwrap(), 11);

    doc.update(|mut d| {
        d.insert("a".into(), VarDef::Constant(10));
        d
    })
    .unwrap();
    assert_eq!(out.get().unwrap(), 18);
    assert_eq!(b_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_undefined_variable_fails() {
    let net = Network::new();
    let doc = net.input(document1());

    let out = net.output({
        let doc = doc.clone();
        move |net| var_value(net, &doc, "z")
    });

    let err = out.get().unwrap_err();
    assert!(err.to_string().contains("undefined variable `z`"));

    doc.update(|mut d| {
        d.insert("z".into(), VarDef::Product(inputs(&["a", "b", "c"])));
        d
    })
    .unwrap();
    assert_eq!(out.get().unwrap(), 84);
}

// =============================================================================
// Memoized functions
// =============================================================================

fn var_functions(net: &Network, doc: &Input<Document>) -> ValueFunc<String, i64> {
    let get_var_def: ValueFunc<String, Option<VarDef>> = net
        .value_func("getVarDef", {
            let doc = doc.clone();
            move |_, name: String| Ok(doc.get()?.get(&name).cloned())
        })
        .unwrap();

    net.value_func_recursive::<String, i64, _>("getVarValue", move |net, get_var_value, name| {
        let def = get_var_def
            .call(net, name.clone())?
            .ok_or_else(|| anyhow::anyhow!("undefined variable `{}`", name))?;
        match def {
            VarDef::Constant(v) => Ok(v),
            VarDef::Sum(names) => names
                .into_iter()
                .map(|n| get_var_value.call(net, n))
                .sum(),
            VarDef::Product(names) => names
                .into_iter()
                .map(|n| get_var_value.call(net, n))
                .product(),
        }
    })
    .unwrap()
}

#[test]
fn test_variables_document_value_func() {
    let net = Network::new();
    let doc = net.input(document1());
    let get_var_value = var_functions(&net, &doc);

    let c = net.output(move |net| get_var_value.call(net, "c".to_string()));

    assert_eq!(c.get().unwrap(), 7);
    assert!(net.contains("getVarValue(\"a\")"));
    assert!(net.contains("getVarDef(\"c\")"));

    doc.update(|mut d| {
        d.insert("a".into(), VarDef::Constant(100));
        d
    })
    .unwrap();
    assert_eq!(c.get().unwrap(), 104);

    doc.update(|mut d| {
        d.insert("c".into(), VarDef::Sum(inputs(&["b"])));
        d
    })
    .unwrap();
    assert_eq!(c.get().unwrap(), 4);
    assert!(!net.contains("getVarValue(\"a\")"));

    c.delete();
    assert_eq!(net.cell_count(), 1);
}
