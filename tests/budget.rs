use std::cell::RefCell;
use std::rc::Rc;

use content_intermediate::{
    check_budget, from_str, from_str_with_options, Budget, BudgetBreach, BudgetReport, ErrorKind, Options,
    TypeRegistry, Value, MAX_OBJECT_NESTING,
};
use indoc::indoc;

const LEVEL: &str = indoc! {r##"
    <XnaContent>
      <Asset>
        <Wave>
          <Item>#R1</Item>
          <Item>#R2</Item>
        </Wave>
      </Asset>
      <Resources>
        <Resource ID="#R1">1</Resource>
        <Resource ID="#R2">2</Resource>
      </Resources>
    </XnaContent>
"##};

fn options(budget: Budget) -> Options {
    Options {
        budget: Some(budget),
        ..Options::default()
    }
}

#[test]
fn report_is_delivered_on_success() {
    let reports: Rc<RefCell<Vec<BudgetReport>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reports);
    let options = Options::default().with_budget_report(move |report| sink.borrow_mut().push(report));

    from_str_with_options(LEVEL, "level.xml", &TypeRegistry::new(), options).unwrap();

    let reports = reports.borrow();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].breached, None);
    assert_eq!(reports[0].max_depth, 4);
    assert_eq!(reports[0].elements, 8);
}

#[test]
fn depth_limit_stops_the_read() {
    let reports: Rc<RefCell<Vec<BudgetReport>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reports);
    let options = options(Budget {
        max_depth: 3,
        ..Budget::default()
    })
    .with_budget_report(move |report| sink.borrow_mut().push(report));

    let err = from_str_with_options(LEVEL, "level.xml", &TypeRegistry::new(), options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Budget);
    assert_eq!(err.location().map(|l| l.line()), Some(4));
    assert_eq!(
        reports.borrow()[0].breached,
        Some(BudgetBreach::Depth { depth: 4 })
    );
}

#[test]
fn resource_count_is_limited() {
    let err = from_str_with_options(
        LEVEL,
        "level.xml",
        &TypeRegistry::new(),
        options(Budget {
            max_shared_resources: 1,
            ..Budget::default()
        }),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Budget);
    assert!(err.message().contains("SharedResources { resources: 2 }"), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(9));
}

#[test]
fn disabled_budget_reads_anything() {
    let options = Options {
        budget: None,
        ..Options::default()
    };
    let graph = from_str_with_options(LEVEL, "level.xml", &TypeRegistry::new(), options).unwrap();
    assert_eq!(graph.resources().len(), 2);
}

#[test]
fn check_budget_scans_without_reading_types() {
    let report = check_budget(LEVEL, &Budget::default()).unwrap();
    assert!(report.breached.is_none());
    assert!(report.total_text_bytes > 0);

    let report = check_budget(
        LEVEL,
        &Budget {
            max_nodes: 5,
            ..Budget::default()
        },
    )
    .unwrap();
    assert!(matches!(report.breached, Some(BudgetBreach::Nodes { .. })));
}

fn nested(levels: usize) -> String {
    format!(
        "<XnaContent><Asset>{}x{}</Asset></XnaContent>",
        "<A>".repeat(levels),
        "</A>".repeat(levels)
    )
}

#[test]
fn nesting_just_under_the_default_limit_is_read() {
    // Root and asset take two levels.
    let levels = Budget::default().max_depth - 2;
    let graph = from_str(&nested(levels), "deep.xml", &TypeRegistry::new()).unwrap();

    let mut value = graph.root();
    for _ in 0..levels {
        value = value.get("A").unwrap();
    }
    assert_eq!(value, &Value::String("x".into()));
}

#[test]
fn nesting_past_the_default_limit_is_a_budget_error() {
    let err = from_str(&nested(Budget::default().max_depth), "deep.xml", &TypeRegistry::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Budget);
}

#[test]
fn reader_caps_nesting_without_a_budget() {
    let options = Options {
        budget: None,
        ..Options::default()
    };
    let err = from_str_with_options(&nested(5_000), "deep.xml", &TypeRegistry::new(), options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Budget);
    let depth = MAX_OBJECT_NESTING + 1;
    assert!(err.message().contains(&format!("Depth {{ depth: {depth} }}")), "{err}");
}
