use gridstate::{
    CellPosition, CellValueNormalizer, ColumnDef, EditorParams, GridApi, HeadlessGrid, Key,
    KeyOutcome, KeyPress, ListState, OptionItem, OptionObject, RawCellValue, Scalar, Selection,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

// Helper function for the catalog used throughout: [{value:1,label:"A"},{value:2,label:"B"}]
fn catalog() -> Vec<OptionItem> {
    vec![option(1, "A"), option(2, "B")]
}

fn option(id: i64, label: &str) -> OptionItem {
    OptionItem::Object(OptionObject::new(id, label))
}

fn identities(selection: &Selection) -> Vec<String> {
    match selection {
        Selection::Single(item) => item.iter().map(|i| i.identity().to_string()).collect(),
        Selection::Multiple(items) => items.iter().map(|i| i.identity().to_string()).collect(),
    }
}

#[test]
fn single_mode_resolves_bare_id_to_option_object() {
    let editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!(2));
    assert_eq!(editor.selection(), &Selection::Single(Some(option(2, "B"))));
}

#[test]
fn multiple_mode_splits_and_trims_comma_joined_ids() {
    let editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!("1, 2"));
    assert_eq!(
        editor.selection(),
        &Selection::Multiple(vec![option(1, "A"), option(2, "B")])
    );
}

#[test]
fn multiple_mode_null_is_empty_list() {
    let editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &Value::Null);
    assert_eq!(editor.selection(), &Selection::Multiple(Vec::new()));
    assert_eq!(editor.get_current_value(), json!([]));
}

#[test]
fn multiple_mode_drops_unknown_ids_and_passes_objects_through() {
    let editor = CellValueNormalizer::new(
        EditorParams::new(catalog()).multiple(),
        &json!([2, 99, {"value": 7, "label": "Legacy"}]),
    );
    assert_eq!(identities(editor.selection()), vec!["2", "7"]);

    let editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!("1,,42"));
    assert_eq!(identities(editor.selection()), vec!["1"]);

    let editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!(1));
    assert_eq!(identities(editor.selection()), vec!["1"]);
}

#[test]
fn single_mode_uses_text_before_first_comma() {
    let editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!("2,1"));
    assert_eq!(identities(editor.selection()), vec!["2"]);

    let editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!("missing"));
    assert_eq!(editor.selection(), &Selection::Single(None));

    let editor = CellValueNormalizer::new(
        EditorParams::new(catalog()),
        &json!({"value": 5, "label": "Off-catalog"}),
    );
    assert_eq!(identities(editor.selection()), vec!["5"]);
}

#[test]
fn falsy_identities_are_still_selections() {
    let options = vec![
        OptionItem::Object(OptionObject::new(0i64, "Zero")),
        OptionItem::Primitive(Scalar::Bool(false)),
    ];
    let editor = CellValueNormalizer::new(EditorParams::new(options.clone()), &json!(0));
    assert_eq!(editor.get_current_value(), json!(0));

    let editor = CellValueNormalizer::new(EditorParams::new(options), &json!(false));
    assert_eq!(editor.get_current_value(), json!(false));
}

#[test]
fn empty_sentinels_differ_by_return_object() {
    let by_id = CellValueNormalizer::new(EditorParams::new(catalog()), &Value::Null);
    assert_eq!(by_id.get_current_value(), json!(""));

    let by_object =
        CellValueNormalizer::new(EditorParams::new(catalog()).return_object(), &Value::Null);
    assert_eq!(by_object.get_current_value(), Value::Null);

    assert_ne!(by_id.get_current_value(), by_object.get_current_value());
}

#[test]
fn reduction_follows_return_object() {
    let ids = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!([1, 2]));
    assert_eq!(ids.get_current_value(), json!([1, 2]));

    let objects = CellValueNormalizer::new(
        EditorParams::new(catalog()).multiple().return_object(),
        &json!([1, 2]),
    );
    assert_eq!(
        objects.get_current_value(),
        json!([{"value": 1, "label": "A"}, {"value": 2, "label": "B"}])
    );
}

#[test]
fn free_solo_returns_typed_text_that_matches_nothing() {
    let mut editor =
        CellValueNormalizer::new(EditorParams::new(catalog()).free_solo(), &Value::Null);
    editor.on_input_change("Something new");
    assert_eq!(editor.get_current_value(), json!("Something new"));

    let seeded =
        CellValueNormalizer::new(EditorParams::new(catalog()).free_solo(), &json!("Custom"));
    assert_eq!(seeded.get_current_value(), json!("Custom"));
}

#[test]
fn free_solo_text_with_commas_round_trips_whole() {
    let mut grid = HeadlessGrid::new(vec![
        ColumnDef::new("contact").editable(),
        ColumnDef::new("notes").editable(),
    ]);
    grid.set_rows(&[json!({})]);
    grid.start_editing_cell(&CellPosition::new(0, "contact"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut editor = CellValueNormalizer::new(
        EditorParams::new(vec![option(1, "A")]).free_solo(),
        &json!("Smith, John"),
    )
    .with_change_listener(move |value| sink.borrow_mut().push(value.clone()));

    assert_eq!(editor.selection(), &Selection::Single(None));
    assert_eq!(editor.input(), "Smith, John");
    assert_eq!(editor.get_current_value(), json!("Smith, John"));

    editor.on_key(KeyPress::new(Key::Tab), &mut grid);
    assert_eq!(*seen.borrow(), vec![json!("Smith, John")]);
}

#[test]
fn free_solo_still_resolves_leading_id_of_comma_list() {
    let editor =
        CellValueNormalizer::new(EditorParams::new(catalog()).free_solo(), &json!("2, 1"));
    assert_eq!(editor.selection(), &Selection::Single(Some(option(2, "B"))));
    assert_eq!(editor.input(), "B");
    assert_eq!(editor.get_current_value(), json!(2));
}

#[test]
fn free_solo_selection_keeps_input_buffer_in_sync() {
    let mut editor =
        CellValueNormalizer::new(EditorParams::new(catalog()).free_solo(), &json!(1));
    assert_eq!(editor.input(), "A");

    editor.on_select(Selection::Single(Some(option(2, "B"))));
    assert_eq!(editor.input(), "B");
    assert_eq!(editor.get_current_value(), json!(2));

    editor.on_select(Selection::Single(None));
    assert_eq!(editor.input(), "");
    assert_eq!(editor.get_current_value(), json!(""));
}

#[test]
fn selection_change_emits_reduced_value_immediately() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!([]))
        .with_change_listener(move |value| sink.borrow_mut().push(value.clone()));

    editor.on_select(Selection::Multiple(vec![option(2, "B")]));
    editor.on_select(Selection::Multiple(vec![option(2, "B"), option(1, "A")]));

    assert_eq!(*seen.borrow(), vec![json!([2]), json!([2, 1])]);
}

#[test]
fn selected_check_compares_identity_across_shapes() {
    let options = vec![
        OptionItem::Primitive(Scalar::Text("Gasoline".into())),
        option(3, "Diesel"),
    ];
    let mut editor = CellValueNormalizer::new(EditorParams::new(options).multiple(), &json!([]));
    editor.on_select(Selection::Multiple(vec![
        OptionItem::Primitive(Scalar::Text("Gasoline".into())),
        OptionItem::Primitive(Scalar::from(3i64)),
    ]));

    assert!(editor.is_option_selected(&option(3, "Diesel")));
    assert!(editor.is_option_selected(&OptionItem::Primitive(Scalar::Text("Gasoline".into()))));
    assert!(!editor.is_option_selected(&option(4, "Electric")));
}

#[test]
fn raw_value_decoding_is_tagged_once() {
    assert_eq!(RawCellValue::decode(&Value::Null), RawCellValue::Absent);
    assert_eq!(RawCellValue::decode(&json!("")), RawCellValue::Absent);
    assert_eq!(
        RawCellValue::decode(&json!({"label": "no id"})),
        RawCellValue::Absent
    );
    assert!(matches!(
        RawCellValue::decode(&json!(["", 1])),
        RawCellValue::List(items) if items.len() == 2
    ));
}

#[test]
fn params_deserialize_from_column_definition() {
    let params: EditorParams = serde_json::from_value(json!({
        "options": ["Gasoline", {"value": 3, "label": "Diesel", "unit": "L"}],
        "multiple": true,
        "disableCloseOnSelect": true,
        "limitTags": 1,
        "returnObject": true,
        "noLabel": true,
        "label": "Fuel"
    }))
    .unwrap();

    assert!(params.multiple && params.return_object && params.disable_close_on_select);
    assert!(params.open_on_focus, "openOnFocus defaults on");
    assert_eq!(params.display_label(), None);

    let editor = CellValueNormalizer::new(params, &json!("Gasoline,3"));
    assert_eq!(
        editor.get_current_value(),
        json!(["Gasoline", {"value": 3, "label": "Diesel", "unit": "L"}])
    );
    assert_eq!(editor.visible_tags(), (vec!["Gasoline".to_string()], 1));
}

#[test]
fn typed_text_narrows_option_list() {
    let mut editor = CellValueNormalizer::new(
        EditorParams::new(vec![option(1, "Ethanol"), option(2, "Methanol"), option(3, "Propane")]),
        &Value::Null,
    );
    editor.on_input_change("thAN");
    let labels: Vec<String> = editor
        .filtered_options()
        .into_iter()
        .map(OptionItem::display_label)
        .collect();
    assert_eq!(labels, vec!["Ethanol", "Methanol"]);
}

#[test]
fn enter_toggles_and_focus_opens_list() {
    let mut grid = HeadlessGrid::with_columns(&["fuel"]);
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()), &Value::Null);
    assert_eq!(editor.list_state(), ListState::Closed);

    editor.on_focus();
    assert_eq!(editor.list_state(), ListState::Open);
    assert_eq!(editor.on_key(KeyPress::new(Key::Enter), &mut grid), KeyOutcome::Handled);
    assert_eq!(editor.list_state(), ListState::Closed);
    assert_eq!(editor.on_key(KeyPress::new(Key::Enter), &mut grid), KeyOutcome::Handled);
    assert_eq!(editor.list_state(), ListState::Open);
    assert_eq!(editor.on_key(KeyPress::new(Key::Escape), &mut grid), KeyOutcome::Handled);
    assert_eq!(editor.on_key(KeyPress::new(Key::Escape), &mut grid), KeyOutcome::Ignored);
}

#[test]
fn select_closes_list_unless_disabled() {
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()).multiple(), &json!([]));
    editor.on_focus();
    editor.on_select(Selection::Multiple(vec![option(1, "A")]));
    assert_eq!(editor.list_state(), ListState::Closed);

    let mut params = EditorParams::new(catalog()).multiple();
    params.disable_close_on_select = true;
    let mut editor = CellValueNormalizer::new(params, &json!([]));
    editor.on_focus();
    editor.on_select(Selection::Multiple(vec![option(1, "A")]));
    assert_eq!(editor.list_state(), ListState::Open);
}

fn editable_row_grid() -> HeadlessGrid {
    let mut grid = HeadlessGrid::new(vec![
        ColumnDef::new("fuelType").editable(),
        ColumnDef::new("category").editable(),
        ColumnDef::new("units").editable(),
    ]);
    grid.set_rows(&[json!({}), json!({})]);
    grid
}

#[test]
fn tab_commits_and_opens_editor_on_next_cell() {
    let mut grid = editable_row_grid();
    grid.start_editing_cell(&CellPosition::new(0, "category"));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!(1))
        .with_change_listener(move |value| sink.borrow_mut().push(value.clone()));

    let outcome = editor.on_key(KeyPress::new(Key::Tab), &mut grid);

    assert_eq!(outcome, KeyOutcome::Committed { moved: true });
    assert_eq!(*seen.borrow(), vec![json!(1)], "value emitted before moving");
    assert_eq!(grid.editing_cell(), Some(&CellPosition::new(0, "units")));
}

#[test]
fn shift_tab_moves_editing_to_previous_cell() {
    let mut grid = editable_row_grid();
    grid.start_editing_cell(&CellPosition::new(0, "category"));
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!(2));

    let outcome = editor.on_key(KeyPress::shifted(Key::Tab), &mut grid);

    assert_eq!(outcome, KeyOutcome::Committed { moved: true });
    assert_eq!(grid.editing_cell(), Some(&CellPosition::new(0, "fuelType")));
}

#[test]
fn tab_past_last_cell_only_stops_editing() {
    let mut grid = editable_row_grid();
    grid.start_editing_cell(&CellPosition::new(1, "units"));
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!(2));

    let outcome = editor.on_key(KeyPress::new(Key::Tab), &mut grid);

    assert_eq!(outcome, KeyOutcome::Committed { moved: false });
    assert!(grid.editing_cell().is_none());
}

#[test]
fn blur_stops_editing_without_emitting() {
    let mut grid = editable_row_grid();
    grid.start_editing_cell(&CellPosition::new(0, "fuelType"));

    let seen = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&seen);
    let mut editor = CellValueNormalizer::new(EditorParams::new(catalog()), &json!(1))
        .with_change_listener(move |_| *sink.borrow_mut() += 1);
    editor.on_focus();

    editor.on_blur(&mut grid);

    assert!(grid.editing_cell().is_none());
    assert_eq!(editor.list_state(), ListState::Closed);
    assert_eq!(*seen.borrow(), 0);
}
