/*
 * reconcile_tests.rs
 *
 * End-to-end tests of incremental rendering against the in-memory document:
 * reuse, eviction, keyed reordering and minimal host writes.
 *
 * Copyright (c) 2025 Posit, PBC
 */

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use webcomp_render::{
    Document, HostNode, MemoryDocument, MemoryNode, MutationStats, RenderResult, TemplateContext,
    Token, Value, attributes,
};

type Ctx = TemplateContext<MemoryDocument>;

// =============================================================================
// Helpers
// =============================================================================

fn setup() -> (MemoryDocument, MemoryNode, Ctx) {
    let doc = MemoryDocument::new();
    let root = doc.create_element("main", None);
    let ctx = TemplateContext::new(doc.clone(), root.clone());
    (doc, root, ctx)
}

fn items(names: &[&str]) -> Value {
    Value::list(names.iter().map(|n| Value::from(*n)))
}

/// `<ul>` with one `<li id=item>item</li>` per item.
fn list_template(items: Value, keyed: bool) -> impl FnOnce(&mut Ctx) -> RenderResult<()> {
    move |ctx: &mut Ctx| -> RenderResult<()> {
        ctx.open(1, "ul", None);
        let body = |ctx: &mut Ctx| -> RenderResult<()> {
            let item = ctx.get(&[Token::SelfRef])?;
            ctx.open(3, "li", Some(attributes([("id", item.clone())])));
            ctx.add_text(4, &item.to_text());
            ctx.close();
            Ok(())
        };
        if keyed {
            ctx.iterate_keyed(2, &items, body, |ctx| ctx.get(&[Token::SelfRef]))?;
        } else {
            ctx.iterate(2, &items, body)?;
        }
        ctx.close();
        Ok(())
    }
}

fn render_list(ctx: &mut Ctx, names: &[&str], keyed: bool) {
    ctx.render(Value::Null, list_template(items(names), keyed))
        .expect("list renders");
}

// =============================================================================
// Reuse and idempotence
// =============================================================================

#[test]
fn test_first_pass_builds_markup() {
    let (_, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b"], false);

    insta::assert_snapshot!(
        root.inner_markup(),
        @r#"<ul><li id="a">a</li><li id="b">b</li></ul>"#
    );
}

#[test]
fn test_identical_pass_touches_nothing() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b", "c"], true);
    let before = root.to_markup();

    doc.reset_stats();
    render_list(&mut ctx, &["a", "b", "c"], true);

    assert_eq!(doc.stats(), MutationStats::default());
    assert_eq!(root.to_markup(), before);
}

#[test]
fn test_sequential_list_reuses_by_position() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b", "c"], false);

    doc.reset_stats();
    render_list(&mut ctx, &["a", "c"], false);

    assert_eq!(
        root.inner_markup(),
        r#"<ul><li id="a">a</li><li id="c">c</li></ul>"#
    );
    let stats = doc.stats();
    assert_eq!(stats.elements_created, 0);
    assert_eq!(stats.attribute_writes, 1);
    assert_eq!(stats.text_writes, 1);
    // The third item's element and its text node
    assert_eq!(stats.removals, 2);
}

#[test]
fn test_keyed_reorder_moves_nodes() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b", "c"], true);
    let li_a = root.children()[0].children()[0].clone();

    doc.reset_stats();
    render_list(&mut ctx, &["c", "a", "b"], true);

    assert_eq!(
        root.inner_markup(),
        r#"<ul><li id="c">c</li><li id="a">a</li><li id="b">b</li></ul>"#
    );
    let stats = doc.stats();
    assert_eq!(stats.elements_created, 0);
    assert_eq!(stats.texts_created, 0);
    assert_eq!(stats.removals, 0);
    assert_eq!(stats.attribute_writes, 0);
    assert_eq!(stats.insertions, 1);
    assert_eq!(root.children()[0].children()[1], li_a);
}

#[test]
fn test_keyed_items_skipped_this_pass_are_removed() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b", "c"], true);
    let li_c = root.children()[0].children()[2].clone();

    doc.reset_stats();
    render_list(&mut ctx, &["c"], true);

    assert_eq!(root.inner_markup(), r#"<ul><li id="c">c</li></ul>"#);
    assert_eq!(root.children()[0].children()[0], li_c);
    let stats = doc.stats();
    assert_eq!(stats.elements_created, 0);
    // Two items, each an element and its text node
    assert_eq!(stats.removals, 4);
}

#[test]
fn test_keyed_list_mixes_new_and_kept_items() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "b", "c"], true);

    doc.reset_stats();
    render_list(&mut ctx, &["c", "d", "a"], true);

    assert_eq!(
        root.inner_markup(),
        r#"<ul><li id="c">c</li><li id="d">d</li><li id="a">a</li></ul>"#
    );
    assert_eq!(doc.stats().elements_created, 1);
}

#[test]
fn test_keyed_duplicates_render_every_item() {
    let (doc, root, mut ctx) = setup();
    render_list(&mut ctx, &["a", "a"], true);
    assert_eq!(
        root.inner_markup(),
        r#"<ul><li id="a">a</li><li id="a">a</li></ul>"#
    );

    doc.reset_stats();
    render_list(&mut ctx, &["a", "a"], true);
    assert_eq!(doc.stats(), MutationStats::default());

    render_list(&mut ctx, &["b", "a"], true);
    assert_eq!(
        root.inner_markup(),
        r#"<ul><li id="b">b</li><li id="a">a</li></ul>"#
    );
}

#[test]
fn test_empty_collection_renders_nothing() {
    let (_, root, mut ctx) = setup();
    render_list(&mut ctx, &["a"], false);
    render_list(&mut ctx, &[], false);
    assert_eq!(root.inner_markup(), "<ul></ul>");
}

// =============================================================================
// Attributes and handlers
// =============================================================================

#[test]
fn test_only_changed_attributes_are_written() {
    let (doc, root, mut ctx) = setup();
    let template = |extra: Option<&'static str>| {
        move |ctx: &mut Ctx| -> RenderResult<()> {
            ctx.open(1, "div", Some(attributes([("id", "x")])));
            ctx.add_class("a");
            if let Some(extra) = extra {
                ctx.add_class(extra);
            }
            ctx.close();
            Ok(())
        }
    };

    ctx.render(Value::Null, template(None)).unwrap();
    doc.reset_stats();
    ctx.render(Value::Null, template(Some("b"))).unwrap();

    assert_eq!(doc.stats().attribute_writes, 1);
    assert_eq!(root.inner_markup(), r#"<div id="x" class="a b"></div>"#);
}

#[test]
fn test_dropped_attribute_is_removed() {
    let (doc, root, mut ctx) = setup();
    let template = |title: Value| {
        move |ctx: &mut Ctx| -> RenderResult<()> {
            ctx.open(1, "p", None);
            ctx.attr("title", title);
            ctx.close();
            Ok(())
        }
    };

    ctx.render(Value::Null, template(Value::from("hi"))).unwrap();
    ctx.render(Value::Null, template(Value::Null)).unwrap();

    assert_eq!(root.inner_markup(), "<p></p>");
    assert_eq!(doc.stats().attribute_removals, 1);
}

#[test]
fn test_inline_event_property_is_not_an_attribute() {
    let (doc, root, mut ctx) = setup();
    ctx.render(Value::Null, |ctx| {
        ctx.open(1, "button", Some(attributes([("onclick", "go()")])));
        ctx.close();
        Ok(())
    })
    .unwrap();

    let button = root.children()[0].clone();
    assert_eq!(button.property("onclick"), Some(Value::from("go()")));
    assert!(!button.has_attribute("onclick"));
    assert_eq!(doc.stats().property_writes, 1);
}

#[test]
fn test_handler_registered_once_and_swapped_in_place() {
    let (doc, root, mut ctx) = setup();
    let hits = Rc::new(Cell::new(0));
    let first = {
        let hits = Rc::clone(&hits);
        Value::function(move |_| {
            hits.set(hits.get() + 1);
            Ok(Value::Null)
        })
    };
    let second = {
        let hits = Rc::clone(&hits);
        Value::function(move |_| {
            hits.set(hits.get() + 100);
            Ok(Value::Null)
        })
    };
    let template = |handler: Value| {
        move |ctx: &mut Ctx| -> RenderResult<()> {
            ctx.open(1, "button", Some(attributes([("on-click", handler)])));
            ctx.close();
            Ok(())
        }
    };

    ctx.render(Value::Null, template(first.clone())).unwrap();
    ctx.render(Value::Null, template(first)).unwrap();
    assert_eq!(doc.stats().listeners_added, 1);

    ctx.render(Value::Null, template(second)).unwrap();
    let button = root.children()[0].clone();
    assert_eq!(button.listener_count(), 1);
    assert!(!button.has_attribute("on-click"));

    button.dispatch("click", &Value::Null).unwrap();
    assert_eq!(hits.get(), 100);
}

#[test]
fn test_xmlns_is_inherited_by_children() {
    let (_, root, mut ctx) = setup();
    ctx.render(Value::Null, |ctx| {
        ctx.open(1, "svg", Some(attributes([("xmlns", "http://www.w3.org/2000/svg")])));
        ctx.open(2, "use", Some(attributes([("xlink:href", "#icon")])));
        ctx.close();
        ctx.close();
        Ok(())
    })
    .unwrap();

    let svg = root.children()[0].clone();
    let inner = svg.children()[0].clone();
    assert_eq!(inner.namespace().as_deref(), Some("http://www.w3.org/2000/svg"));
    assert_eq!(inner.get_attribute("xlink:href"), Some(Value::from("#icon")));
}

// =============================================================================
// Content slots
// =============================================================================

fn card_template(with_child: bool) -> impl FnOnce(&mut Ctx) -> RenderResult<()> {
    move |ctx: &mut Ctx| -> RenderResult<()> {
        ctx.open(1, "x-card", None);
        if with_child {
            ctx.open(2, "p", None);
            ctx.set_text("hi");
            ctx.close();
        }
        ctx.close();
        Ok(())
    }
}

#[test]
fn test_component_children_go_to_default_slot() {
    let (doc, root, mut ctx) = setup();
    doc.register_component("x-card");

    ctx.render(Value::Null, card_template(true)).unwrap();
    let card = root.children()[0].clone();
    let slot = card.slot(None).expect("components have slots");
    assert!(slot.has_attribute("slotted"));

    // The card's own template places its slot
    let mut view = TemplateContext::new(doc.clone(), card.clone());
    let mut empty = None;
    view.render(Value::Null, |ctx| {
        ctx.open(1, "slot", None);
        empty = Some(ctx.empty_slot());
        ctx.close();
        Ok(())
    })
    .unwrap();

    assert_eq!(empty, Some(false));
    insta::assert_snapshot!(
        root.inner_markup(),
        @r#"<x-card><slot slotted=""><p>hi</p></slot></x-card>"#
    );

    ctx.render(Value::Null, card_template(false)).unwrap();
    assert!(!slot.has_attribute("slotted"));
    assert!(slot.children().is_empty());

    view.render(Value::Null, |ctx| {
        ctx.open(1, "slot", None);
        empty = Some(ctx.empty_slot());
        ctx.close();
        Ok(())
    })
    .unwrap();
    assert_eq!(empty, Some(true));
}

#[test]
fn test_hidden_slot_placeholder_leaves_view() {
    let doc = MemoryDocument::new();
    doc.register_component("x-card");
    let card = doc.create_element("x-card", None);
    let mut view = TemplateContext::new(doc.clone(), card.clone());
    let card_view = |show: bool| {
        move |ctx: &mut Ctx| -> RenderResult<()> {
            ctx.open(1, "header", None);
            ctx.close();
            if show {
                ctx.open(2, "slot", None);
                ctx.close();
            }
            Ok(())
        }
    };

    view.render(Value::Null, card_view(true)).unwrap();
    assert_eq!(card.inner_markup(), "<header></header><slot></slot>");

    view.render(Value::Null, card_view(false)).unwrap();
    assert_eq!(card.inner_markup(), "<header></header>");

    // The component keeps its slot and hands the same node out again
    view.render(Value::Null, card_view(true)).unwrap();
    assert_eq!(card.inner_markup(), "<header></header><slot></slot>");
    assert_eq!(card.children()[1], card.slot(None).unwrap());
}

#[test]
fn test_named_slot_receives_marked_children() {
    let (doc, root, mut ctx) = setup();
    doc.register_component("x-card");

    ctx.render(Value::Null, |ctx| {
        ctx.open(1, "x-card", None);
        ctx.open(2, "h2", Some(attributes([("slot", "header")])));
        ctx.close();
        ctx.open(3, "p", None);
        ctx.close();
        ctx.close();
        Ok(())
    })
    .unwrap();

    let card = root.children()[0].clone();
    let header = card.slot(Some("header")).unwrap();
    let body = card.slot(None).unwrap();
    assert_eq!(header.inner_markup(), r#"<h2 slot="header"></h2>"#);
    assert_eq!(body.inner_markup(), "<p></p>");
    assert!(card.children().is_empty());
}

#[test]
fn test_set_text_on_component_fills_default_slot() {
    let (doc, root, mut ctx) = setup();
    doc.register_component("x-badge");

    ctx.render(Value::Null, |ctx| {
        ctx.open(1, "x-badge", None);
        ctx.set_text("3");
        ctx.close();
        Ok(())
    })
    .unwrap();

    let badge = root.children()[0].clone();
    let slot = badge.slot(None).unwrap();
    assert_eq!(slot.text_content(), "3");
    assert!(slot.has_attribute("slotted"));
}

// =============================================================================
// Data access through templates
// =============================================================================

#[test]
fn test_multi_value_paths_collapse() {
    let (_, root, mut ctx) = setup();
    let data = Value::from(serde_json::json!({
        "users": [
            { "name": "ann", "admin": true },
            { "name": "bob", "admin": false },
        ]
    }));

    ctx.render(data, |ctx| {
        let names = ctx.get(&["users".into(), Token::Wildcard, "name".into()])?;
        let admins = ctx.get(&[
            "users".into(),
            Token::predicate(|scope| Ok(scope.get(&["admin".into()])?.is_truthy())),
            "name".into(),
        ])?;
        ctx.open(1, "p", None);
        ctx.add_text(2, &names.to_text());
        ctx.close();
        ctx.open(3, "p", None);
        ctx.add_text(4, &admins.to_text());
        ctx.close();
        Ok(())
    })
    .unwrap();

    assert_eq!(root.inner_markup(), r#"<p>["ann","bob"]</p><p>ann</p>"#);
}

// =============================================================================
// Properties
// =============================================================================

fn distinct(keys: Vec<u8>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|k| seen.insert(*k))
        .map(|k| format!("k{k}"))
        .collect()
}

fn fresh_markup(names: &[&str], keyed: bool) -> String {
    let (_, root, mut ctx) = setup();
    render_list(&mut ctx, names, keyed);
    root.inner_markup()
}

proptest! {
    #[test]
    fn prop_incremental_pass_matches_fresh_render(
        before in prop::collection::vec(0u8..12, 0..10),
        after in prop::collection::vec(0u8..12, 0..10),
        keyed in any::<bool>(),
    ) {
        let before = distinct(before);
        let after = distinct(after);
        let before: Vec<&str> = before.iter().map(String::as_str).collect();
        let after: Vec<&str> = after.iter().map(String::as_str).collect();

        let (_, root, mut ctx) = setup();
        render_list(&mut ctx, &before, keyed);
        render_list(&mut ctx, &after, keyed);

        prop_assert_eq!(root.inner_markup(), fresh_markup(&after, keyed));
    }
}
