use arrow_array::RecordBatch;
use batchview_ipc::testutil::assert_tables_eq;
use batchview_ipc::writer::table_to_bytes;
use batchview_ipc::{
    read_first_batch, read_table, CellValue, IpcBatchReader, IpcMode, Table, ToTabular,
};
use test_bin::{mixed_batch, mixed_schema, scenario_batch, write_with_arrow};

const MODES: [IpcMode; 2] = [IpcMode::File, IpcMode::Stream];

#[test]
fn three_by_two_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let batch = scenario_batch();

    for mode in MODES {
        let path = dir.path().join(format!("scenario.{mode}.arrow"));
        write_with_arrow(&path, mode, &batch.schema(), &[batch.clone()]);

        let table = read_table(path, mode).unwrap();
        assert_eq!(3, table.num_rows());
        assert_eq!(2, table.num_columns());

        let tabular = table.to_tabular().unwrap();
        assert_eq!(
            vec![
                vec![CellValue::Int(1), CellValue::Utf8("a".to_string())],
                vec![CellValue::Int(2), CellValue::Utf8("b".to_string())],
                vec![CellValue::Int(3), CellValue::Utf8("c".to_string())],
            ],
            tabular.rows
        );
    }
}

#[test]
fn single_batch_then_end_of_stream() {
    let dir = tempfile::tempdir().unwrap();
    let batch = scenario_batch();

    for mode in MODES {
        let path = dir.path().join(format!("single.{mode}.arrow"));
        write_with_arrow(&path, mode, &batch.schema(), &[batch.clone()]);

        let mut reader = IpcBatchReader::open(path, mode).unwrap();
        assert_eq!(Some(batch.clone()), reader.read_next_batch().unwrap());
        assert_eq!(None, reader.read_next_batch().unwrap());
        reader.close();
    }
}

#[test]
fn multi_batch_read_all() {
    let dir = tempfile::tempdir().unwrap();
    let schema = mixed_schema();
    let batches: Vec<RecordBatch> = vec![
        mixed_batch(0, 10),
        mixed_batch(10, 1),
        mixed_batch(11, 25),
    ];

    for mode in MODES {
        let path = dir.path().join(format!("multi.{mode}.arrow"));
        write_with_arrow(&path, mode, &schema, &batches);

        let table = read_table(path, mode).unwrap();

        let expected_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(expected_rows, table.num_rows());
        assert_eq!(&schema, table.schema());
        for batch in table.batches() {
            assert_eq!(schema, batch.schema());
        }

        let expected = Table::try_new(schema.clone(), batches.clone()).unwrap();
        assert_eq!(expected, table);
    }
}

#[test]
fn roundtrip_through_own_writer() {
    let expected =
        Table::try_new(mixed_schema(), vec![mixed_batch(0, 7), mixed_batch(7, 3)]).unwrap();

    for mode in MODES {
        let bytes = table_to_bytes(&expected, mode).unwrap();
        let got = read_table(bytes, mode).unwrap();
        assert_tables_eq(&expected, &got);
    }
}

#[test]
fn first_batch_of_many() {
    let dir = tempfile::tempdir().unwrap();
    let schema = mixed_schema();
    let batches = vec![mixed_batch(0, 4), mixed_batch(4, 4)];

    for mode in MODES {
        let path = dir.path().join(format!("first.{mode}.arrow"));
        write_with_arrow(&path, mode, &schema, &batches);

        let first = read_first_batch(path, mode).unwrap();
        assert_eq!(Some(batches[0].clone()), first);
    }
}

#[test]
fn schema_only_source() {
    let dir = tempfile::tempdir().unwrap();
    let schema = mixed_schema();

    for mode in MODES {
        let path = dir.path().join(format!("empty.{mode}.arrow"));
        write_with_arrow(&path, mode, &schema, &[]);

        let mut reader = IpcBatchReader::open(&path, mode).unwrap();
        assert_eq!(&schema, reader.schema());
        assert_eq!(None, reader.read_next_batch().unwrap());

        let table = read_table(path, mode).unwrap();
        assert_eq!(0, table.num_rows());
        assert_eq!(6, table.num_columns());
    }
}

#[test]
fn tabular_keeps_nulls_and_order() {
    let table = Table::from_batch(mixed_batch(100, 5));
    let tabular = table.to_tabular().unwrap();

    assert_eq!(5, tabular.num_rows());
    assert_eq!(6, tabular.num_columns());

    let ids: Vec<_> = tabular.column_values(0).unwrap();
    assert_eq!(
        vec![
            &CellValue::Int(100),
            &CellValue::Int(101),
            &CellValue::Int(102),
            &CellValue::Int(103),
            &CellValue::Int(104)
        ],
        ids
    );
    // score is null every third row.
    assert_eq!(Some(&CellValue::Null), tabular.cell(2, 1));
    // label is null for the fifth row.
    assert_eq!(Some(&CellValue::Null), tabular.cell(4, 3));
    assert_eq!(Some(&CellValue::Utf8("row-100".to_string())), tabular.cell(0, 3));
    assert_eq!(Some(&CellValue::Formatted("[0, 1]".to_string())), tabular.cell(2, 5));
}
