//! Convergence and error-propagation behavior of the engine.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use common::{call_log, FailOn, PassCounter, Stamp};
use mahabhuta::services::builtin::metadata;
use mahabhuta::{
    process1, process_async, CallbackMember, DirtyFlag, Document, Element, ElementReplacer,
    Engine, EngineConfig, EngineError, HandlerContext, HandlerGroup, HandlerKind, Member,
    Metadata, Options, PageTransform, TraceConfig, TreeMutator,
};

const FUNKY: &str = r#"<div class="funky-bump">Do the funky bump!</div>"#;

fn group_of(name: &str, members: Vec<Member>) -> HandlerGroup {
    let mut group = HandlerGroup::new(name, Options::new());
    group.set_members(members).unwrap();
    group
}

// ============================================================
// Convergence
// ============================================================

#[tokio::test]
async fn test_idempotent_after_convergence() {
    let stamp = Stamp::new("funky-bump", FUNKY).dirty();
    let calls = stamp.calls();
    let group = group_of("funky", vec![Member::replacer(stamp)]);

    let first = process_async(
        "<funky-bump></funky-bump>",
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap();
    assert_eq!(first, FUNKY);
    assert_eq!(calls.get(), 1);

    let second = process_async(first.as_str(), &mut Metadata::new(), &group)
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(calls.get(), 1, "Nothing should match after convergence");
}

#[tokio::test]
async fn test_replacements_keep_document_order() {
    // Registered in reverse so handler order and document order differ.
    let group = group_of(
        "order",
        vec![
            Member::replacer(Stamp::new("tag-c", "<p>C</p>")),
            Member::replacer(Stamp::new("tag-b", "<p>B</p>")),
            Member::replacer(Stamp::new("tag-a", "<p>A</p>")),
        ],
    );

    let output = process_async(
        "<tag-a></tag-a><tag-b></tag-b><tag-c></tag-c>",
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap();
    assert_eq!(output, "<p>A</p><p>B</p><p>C</p>");
}

#[tokio::test]
async fn test_dirty_rescan_reaches_earlier_handler() {
    let counter = PassCounter::new();
    let passes = counter.passes();

    // The inner handler is registered first, so it only sees <inner-tag>
    // on the pass after the outer handler produced it.
    let mut group = group_of(
        "rescan",
        vec![
            Member::replacer(Stamp::new("inner-tag", "<em>inner</em>")),
            Member::replacer(Stamp::new("outer-tag", "<inner-tag></inner-tag>").dirty()),
        ],
    );
    group.add_final(Member::page(counter)).unwrap();

    let output = process_async(
        "<p><outer-tag></outer-tag></p>",
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap();

    assert_eq!(output, "<p><em>inner</em></p>");
    assert_eq!(passes.get(), 2);
}

#[tokio::test]
async fn test_without_dirty_new_tags_stay_unexpanded() {
    let group = group_of(
        "lazy",
        vec![
            Member::replacer(Stamp::new("inner-tag", "<em>inner</em>")),
            Member::replacer(Stamp::new("outer-tag", "<inner-tag></inner-tag>")),
        ],
    );

    let output = process_async("<outer-tag></outer-tag>", &mut Metadata::new(), &group)
        .await
        .unwrap();
    assert_eq!(output, "<inner-tag></inner-tag>");
}

#[tokio::test]
async fn test_same_pass_sees_earlier_members_output() {
    let group = group_of(
        "chain",
        vec![
            Member::replacer(Stamp::new("step-one", "<step-two></step-two>")),
            Member::replacer(Stamp::new("step-two", "<b>done</b>")),
        ],
    );

    let output = process_async("<step-one></step-one>", &mut Metadata::new(), &group)
        .await
        .unwrap();
    assert_eq!(output, "<b>done</b>");
}

#[tokio::test]
async fn test_empty_match_set_is_noop() {
    let stamp = Stamp::new("nothing-here", "<p>never</p>").dirty();
    let calls = stamp.calls();
    let group = group_of("empty", vec![Member::replacer(stamp)]);

    let mut doc = Document::parse("<section><p>kept</p></section>").unwrap();
    let dirty = DirtyFlag::new();
    group
        .process(&mut doc, &mut Metadata::new(), &dirty, TraceConfig::default())
        .await
        .unwrap();

    assert_eq!(doc.to_html().unwrap(), "<section><p>kept</p></section>");
    assert!(!dirty.is_dirty());
    assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn test_pass_limit_stops_oscillation() {
    struct AlwaysDirty;

    #[async_trait(?Send)]
    impl PageTransform for AlwaysDirty {
        fn name(&self) -> &str {
            "always-dirty"
        }

        async fn process(
            &self,
            _doc: &mut Document,
            _metadata: &mut Metadata,
            dirty: &DirtyFlag,
            _ctx: &HandlerContext<'_>,
        ) -> anyhow::Result<()> {
            dirty.set_dirty();
            Ok(())
        }
    }

    let engine = Engine::new(EngineConfig {
        max_passes: Some(3),
        ..Default::default()
    });
    let err = engine
        .process_one("<p>x</p>", &mut Metadata::new(), Member::page(AlwaysDirty))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PassLimitExceeded(3)));
    assert_eq!(err.to_string(), "Processing did not converge after 3 passes");
}

// ============================================================
// Error propagation
// ============================================================

#[tokio::test]
async fn test_error_aborts_remaining_elements_and_members() {
    let failing = FailOn::new("fail-tag", 1);
    let fail_calls = failing.calls();
    let later = Stamp::new("later-tag", "<p>later</p>");
    let later_calls = later.calls();
    let last = Stamp::new("fail-tag", "<p>last</p>");
    let last_calls = last.calls();

    let group = group_of(
        "abort",
        vec![
            Member::replacer(failing),
            Member::replacer(later),
            Member::replacer(last),
        ],
    );

    let err = process_async(
        r#"<fail-tag id="one"></fail-tag><fail-tag id="two"></fail-tag><fail-tag id="three"></fail-tag><later-tag></later-tag>"#,
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap_err();

    assert_eq!(fail_calls.get(), 2, "Third element must not be processed");
    assert_eq!(later_calls.get(), 0);
    assert_eq!(last_calls.get(), 0);

    assert_eq!(err.to_string(), "abort caught error in ElementReplacer(fail-tag)");
    assert_eq!(
        err.chain_message(),
        "abort caught error in ElementReplacer(fail-tag): \
         ElementReplacer(fail-tag) failed on element 2 of 3: boom"
    );
    assert_eq!(err.root_cause().to_string(), "boom");
}

/// Numbers each `<note-item>` in visit order and nests a fresh
/// `<note-item>` inside it. Fails on the zero-based call `fail_at`.
struct NoteNumberer {
    seen: common::CallLog,
    fail_at: Option<usize>,
}

#[async_trait(?Send)]
impl TreeMutator for NoteNumberer {
    fn selector(&self) -> &str {
        "note-item"
    }

    async fn process(
        &self,
        doc: &mut Document,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<()> {
        let id = element.attr("id").unwrap_or_default();
        let call = self.seen.borrow().len();
        self.seen.borrow_mut().push(id.clone());
        if self.fail_at == Some(call) {
            anyhow::bail!("cannot number {id}");
        }
        element.set_attr("data-order", &(call + 1).to_string());
        doc.append_html(element, &format!(r#"<note-item id="{id}-child"></note-item>"#))?;
        Ok(())
    }
}

const NOTES: &str = concat!(
    r#"<div><note-item id="a"></note-item>"#,
    r#"<section><note-item id="b"></note-item></section></div>"#,
    r#"<note-item id="c"></note-item>"#
);

#[tokio::test]
async fn test_mutator_visits_snapshot_in_document_order() {
    let seen = call_log();
    let group = group_of(
        "mutate",
        vec![Member::mutator(NoteNumberer {
            seen: Rc::clone(&seen),
            fail_at: None,
        })],
    );

    let output = process_async(NOTES, &mut Metadata::new(), &group)
        .await
        .unwrap();

    // Nested children are added during the call but were not in the
    // snapshot, so they are left untouched.
    assert_eq!(*seen.borrow(), vec!["a", "b", "c"]);
    assert_eq!(
        output,
        concat!(
            r#"<div><note-item id="a" data-order="1"><note-item id="a-child"></note-item></note-item>"#,
            r#"<section><note-item id="b" data-order="2"><note-item id="b-child"></note-item></note-item></section></div>"#,
            r#"<note-item id="c" data-order="3"><note-item id="c-child"></note-item></note-item>"#
        )
    );
}

#[tokio::test]
async fn test_mutator_failure_skips_remaining_elements() {
    let seen = call_log();
    let group = group_of(
        "mutate",
        vec![Member::mutator(NoteNumberer {
            seen: Rc::clone(&seen),
            fail_at: Some(1),
        })],
    );

    let err = process_async(NOTES, &mut Metadata::new(), &group)
        .await
        .unwrap_err();

    assert_eq!(*seen.borrow(), vec!["a", "b"], "Third element must not be visited");
    assert_eq!(
        err.chain_message(),
        "mutate caught error in TreeMutator(note-item): \
         TreeMutator(note-item) failed on element 2 of 3: cannot number b"
    );
    assert_eq!(err.trail(), vec!["mutate", "TreeMutator(note-item)"]);
}

#[tokio::test]
async fn test_nested_group_error_chain() {
    let inner = group_of("inner", vec![Member::replacer(FailOn::new("fail-tag", 0))]);
    let middle = group_of("middle", vec![Member::Group(inner)]);
    let outer = group_of("outer", vec![Member::Group(middle)]);

    let err = process_async("<fail-tag></fail-tag>", &mut Metadata::new(), &outer)
        .await
        .unwrap_err();

    assert_eq!(
        err.trail(),
        vec!["outer", "middle", "inner", "ElementReplacer(fail-tag)"]
    );
    assert!(err.chain_message().starts_with(
        "outer caught error in HandlerGroup(middle): middle caught error in HandlerGroup(inner)"
    ));
}

#[tokio::test]
async fn test_missing_href_fails_without_markup() {
    let group = metadata::group(Options::new()).unwrap();

    let err = process_async(
        "<external-stylesheet></external-stylesheet>",
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap_err();

    assert_eq!(err.root_cause().to_string(), "No href supplied");
    assert_eq!(
        err.trail(),
        vec!["metadata", "ElementReplacer(external-stylesheet)"]
    );
}

#[tokio::test]
async fn test_process1_wraps_in_master_group() {
    let err = process1(
        "<fail-tag></fail-tag>",
        &mut Metadata::new(),
        Member::replacer(FailOn::new("fail-tag", 0)),
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "master caught error in ElementReplacer(fail-tag)");
}

// ============================================================
// Member shapes
// ============================================================

#[tokio::test]
async fn test_page_transform_sees_whole_page() {
    struct CollectHeadings;

    #[async_trait(?Send)]
    impl PageTransform for CollectHeadings {
        fn name(&self) -> &str {
            "collect-headings"
        }

        async fn process(
            &self,
            doc: &mut Document,
            metadata: &mut Metadata,
            _dirty: &DirtyFlag,
            _ctx: &HandlerContext<'_>,
        ) -> anyhow::Result<()> {
            let headings: Vec<String> = doc.select("h2")?.iter().map(Element::text).collect();
            metadata.insert("headings", headings);
            Ok(())
        }
    }

    let mut metadata = Metadata::new();
    process1(
        "<h2>One</h2><p>x</p><h2>Two</h2>",
        &mut metadata,
        Member::page(CollectHeadings),
    )
    .await
    .unwrap();

    assert_eq!(
        metadata.get("headings"),
        Some(&serde_json::json!(["One", "Two"]))
    );
}

#[tokio::test]
async fn test_inline_list_shares_parent_options() {
    struct Greeting;

    #[async_trait(?Send)]
    impl ElementReplacer for Greeting {
        fn element_name(&self) -> &str {
            "greeting"
        }

        async fn process(
            &self,
            _element: &Element,
            _metadata: &mut Metadata,
            _dirty: &DirtyFlag,
            ctx: &HandlerContext<'_>,
        ) -> anyhow::Result<Option<String>> {
            let word = ctx.options().get_str("word").unwrap_or("missing");
            Ok(Some(format!("<span>{word} from {}</span>", ctx.group_name())))
        }
    }

    let mut group = HandlerGroup::new("site", Options::new().with("word", "hello"));
    group
        .add(vec![Member::replacer(Greeting), Member::replacer(FailOn::new("fail-tag", 0))])
        .unwrap();

    let output = process_async("<greeting></greeting>", &mut Metadata::new(), &group)
        .await
        .unwrap();
    assert_eq!(output, "<span>hello from inline</span>");

    let err = process_async("<fail-tag></fail-tag>", &mut Metadata::new(), &group)
        .await
        .unwrap_err();
    assert_eq!(err.trail(), vec!["site", "inline", "ElementReplacer(fail-tag)"]);
}

#[tokio::test]
async fn test_final_list_runs_after_main_list() {
    let log = call_log();
    let mut group = HandlerGroup::new("phases", Options::new());
    group
        .add_final(Member::replacer(Stamp::new("late-tag", "").logged(&log)))
        .unwrap()
        .add(Member::replacer(Stamp::new("early-tag", "").logged(&log)))
        .unwrap();

    let output = process_async(
        "<late-tag></late-tag><early-tag></early-tag>",
        &mut Metadata::new(),
        &group,
    )
    .await
    .unwrap();

    assert_eq!(output, "");
    assert_eq!(*log.borrow(), vec!["early-tag", "late-tag"]);
}

#[tokio::test]
async fn test_callback_member_mutates_tree() {
    let callback = CallbackMember::new("mark-links", |doc, _metadata, _dirty, done| {
        match doc.select("a") {
            Ok(links) => {
                for link in links {
                    link.set_attr("rel", "external");
                }
                done.done();
            }
            Err(err) => done.fail(err),
        }
    });

    let output = process1(r#"<a href="/x">x</a>"#, &mut Metadata::new(), callback)
        .await
        .unwrap();
    assert_eq!(output, r#"<a href="/x" rel="external">x</a>"#);
}

#[tokio::test]
async fn test_callback_failure_and_abandonment() {
    let failing = CallbackMember::new("grumpy", |_doc, _metadata, _dirty, done| {
        done.fail(anyhow::anyhow!("not today"));
    });
    let err = process1("<p>x</p>", &mut Metadata::new(), failing)
        .await
        .unwrap_err();
    assert_eq!(err.trail(), vec!["master", "Callback(grumpy)"]);
    assert_eq!(err.root_cause().to_string(), "not today");

    let silent = CallbackMember::new("silent", |_doc, _metadata, _dirty, done| drop(done));
    let err = process1("<p>x</p>", &mut Metadata::new(), silent)
        .await
        .unwrap_err();
    assert!(err.chain_message().ends_with(
        "Callback silent dropped its completion handle without signalling"
    ));
}

#[test]
fn test_shared_options_across_groups() {
    let options = HandlerGroup::new("first", Options::new().with("site", "demo")).shared_options();
    let second = HandlerGroup::with_shared_options("second", std::sync::Arc::clone(&options));
    assert_eq!(second.options().get_str("site"), Some("demo"));
}

#[tokio::test]
async fn test_metadata_updates_visible_to_later_handlers() {
    struct SetTitle;

    #[async_trait(?Send)]
    impl ElementReplacer for SetTitle {
        fn element_name(&self) -> &str {
            "set-title"
        }

        async fn process(
            &self,
            element: &Element,
            metadata: &mut Metadata,
            _dirty: &DirtyFlag,
            _ctx: &HandlerContext<'_>,
        ) -> anyhow::Result<Option<String>> {
            metadata.insert("title", element.text());
            Ok(None)
        }
    }

    struct ShowTitle {
        seen: Rc<Cell<bool>>,
    }

    #[async_trait(?Send)]
    impl ElementReplacer for ShowTitle {
        fn element_name(&self) -> &str {
            "show-title"
        }

        async fn process(
            &self,
            _element: &Element,
            metadata: &mut Metadata,
            _dirty: &DirtyFlag,
            _ctx: &HandlerContext<'_>,
        ) -> anyhow::Result<Option<String>> {
            self.seen.set(true);
            Ok(metadata.get_str("title").map(|t| format!("<h1>{t}</h1>")))
        }
    }

    let seen = Rc::new(Cell::new(false));
    let group = group_of(
        "titles",
        vec![
            Member::replacer(SetTitle),
            Member::replacer(ShowTitle {
                seen: Rc::clone(&seen),
            }),
        ],
    );

    let mut metadata = Metadata::new();
    let output = process_async(
        "<set-title>Hello</set-title><show-title></show-title>",
        &mut metadata,
        &group,
    )
    .await
    .unwrap();

    assert!(seen.get());
    assert_eq!(output, "<h1>Hello</h1>");
    assert_eq!(metadata.get_str("title"), Some("Hello"));
}

#[test]
fn test_handler_kind_labels() {
    assert_eq!(HandlerKind::TreeMutator.to_string(), "TreeMutator");
    assert_eq!(HandlerKind::PageTransform.to_string(), "PageTransform");
}
