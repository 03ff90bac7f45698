// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! nom-based parser for the supported SQL subset

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, map_opt, map_res, not, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use std::fmt;

use super::ast::{
    ColumnDefinition, CreateTableStatement, InsertStatement, SelectItem, SelectStatement,
    SqlStatement,
};
use crate::error::{Result, TableError};
use crate::plan::AggregateFunction;
use crate::types::{DataType, Value};

/// Turns statement text into a parsed statement
pub trait SqlParser: Send + Sync + fmt::Debug {
    fn parse(&self, sql: &str) -> Result<SqlStatement>;
}

/// Parser for the built-in SQL subset
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSqlParser;

impl SqlParser for SimpleSqlParser {
    fn parse(&self, sql: &str) -> Result<SqlStatement> {
        match statement(sql) {
            Ok((_, parsed)) => Ok(parsed),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let near: String = e.input.trim_start().chars().take(24).collect();
                if near.is_empty() {
                    Err(TableError::Parse("unexpected end of statement".to_string()))
                } else {
                    Err(TableError::Parse(format!("syntax error near '{}'", near)))
                }
            }
            Err(nom::Err::Incomplete(_)) => {
                Err(TableError::Parse("incomplete statement".to_string()))
            }
        }
    }
}

/// Split a script into statements on `;`, ignoring `--` comments and
/// semicolons inside string literals
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for line in script.lines() {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_string = !in_string;
                    current.push(c);
                }
                '-' if !in_string && chars.peek() == Some(&'-') => break,
                ';' if !in_string => {
                    let statement = current.trim();
                    if !statement.is_empty() {
                        statements.push(statement.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        current.push('\n');
    }
    let rest = current.trim();
    if !rest.is_empty() {
        statements.push(rest.to_string());
    }
    statements
}

type ParseResult<'a, O> = IResult<&'a str, O>;

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    F: FnMut(&'a str) -> ParseResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    ws(terminated(tag_no_case(word), not(satisfy(is_ident_char))))
}

fn bare_identifier(input: &str) -> ParseResult<&str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

fn quoted_identifier(input: &str) -> ParseResult<&str> {
    delimited(char('`'), take_while1(|c| c != '`'), char('`'))(input)
}

/// Column or alias name, unquoted
fn identifier(input: &str) -> ParseResult<String> {
    map(alt((quoted_identifier, bare_identifier)), str::to_string)(input)
}

/// Dot-separated name parts, quotes removed
fn name_parts(input: &str) -> ParseResult<Vec<&str>> {
    separated_list1(char('.'), alt((quoted_identifier, bare_identifier)))(input)
}

/// Table name as written
fn qualified_name(input: &str) -> ParseResult<String> {
    map(recognize(name_parts), str::to_string)(input)
}

/// Split a table name into its unquoted parts
pub(crate) fn table_name_parts(name: &str) -> Result<Vec<String>> {
    all_consuming(ws(name_parts))(name)
        .map(|(_, parts)| parts.into_iter().map(str::to_string).collect())
        .map_err(|_| TableError::Parse(format!("invalid table name '{}'", name)))
}

fn string_literal(input: &str) -> ParseResult<String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut text = String::new();
    loop {
        match rest.find('\'') {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some(end) => {
                text.push_str(&rest[..end]);
                rest = &rest[end + 1..];
                // '' is an escaped quote
                match rest.strip_prefix('\'') {
                    Some(after) => {
                        text.push('\'');
                        rest = after;
                    }
                    None => return Ok((rest, text)),
                }
            }
        }
    }
}

fn number_literal(input: &str) -> ParseResult<Value> {
    let double = map_res(
        recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
        |text: &str| text.parse::<f64>().map(Value::Double),
    );
    let integer = map_res(recognize(pair(opt(char('-')), digit1)), |text: &str| {
        text.parse::<i64>().map(Value::BigInt)
    });
    alt((double, integer))(input)
}

fn literal(input: &str) -> ParseResult<Value> {
    alt((
        map(string_literal, Value::String),
        number_literal,
        value(Value::Boolean(true), keyword("TRUE")),
        value(Value::Boolean(false), keyword("FALSE")),
    ))(input)
}

fn data_type(input: &str) -> ParseResult<DataType> {
    map_opt(bare_identifier, DataType::from_sql_name)(input)
}

fn column_definition(input: &str) -> ParseResult<ColumnDefinition> {
    map(
        tuple((
            ws(identifier),
            ws(data_type),
            opt(pair(keyword("NOT"), keyword("NULL"))),
        )),
        |(name, data_type, not_null)| ColumnDefinition {
            name,
            data_type,
            nullable: not_null.is_none(),
        },
    )(input)
}

fn table_options(input: &str) -> ParseResult<Vec<(String, String)>> {
    preceded(
        keyword("WITH"),
        delimited(
            ws(char('(')),
            separated_list0(
                ws(char(',')),
                separated_pair(ws(string_literal), ws(char('=')), ws(string_literal)),
            ),
            ws(char(')')),
        ),
    )(input)
}

fn create_table(input: &str) -> ParseResult<SqlStatement> {
    map(
        tuple((
            keyword("CREATE"),
            opt(keyword("TEMPORARY")),
            keyword("TABLE"),
            ws(qualified_name),
            delimited(
                ws(char('(')),
                separated_list1(ws(char(',')), column_definition),
                ws(char(')')),
            ),
            opt(table_options),
        )),
        |(_, temporary, _, name, columns, options)| {
            SqlStatement::CreateTable(CreateTableStatement {
                name,
                temporary: temporary.is_some(),
                columns,
                options: options.unwrap_or_default(),
            })
        },
    )(input)
}

fn alias(input: &str) -> ParseResult<String> {
    preceded(keyword("AS"), ws(identifier))(input)
}

fn aggregate_item(input: &str) -> ParseResult<SelectItem> {
    map(
        tuple((
            alt((
                value(AggregateFunction::Count, keyword("COUNT")),
                value(AggregateFunction::Sum, keyword("SUM")),
            )),
            delimited(
                ws(char('(')),
                alt((value(None, ws(char('*'))), map(ws(identifier), Some))),
                ws(char(')')),
            ),
            opt(alias),
        )),
        |(function, argument, alias)| SelectItem::Aggregate {
            function,
            argument,
            alias,
        },
    )(input)
}

fn select_item(input: &str) -> ParseResult<SelectItem> {
    alt((
        value(SelectItem::Wildcard, ws(char('*'))),
        aggregate_item,
        map(pair(ws(identifier), opt(alias)), |(name, alias)| {
            SelectItem::Column { name, alias }
        }),
    ))(input)
}

fn where_clause(input: &str) -> ParseResult<(String, Value)> {
    preceded(
        keyword("WHERE"),
        separated_pair(ws(identifier), ws(char('=')), ws(literal)),
    )(input)
}

fn group_by_clause(input: &str) -> ParseResult<Vec<String>> {
    preceded(
        pair(keyword("GROUP"), keyword("BY")),
        separated_list1(ws(char(',')), ws(identifier)),
    )(input)
}

fn select(input: &str) -> ParseResult<SelectStatement> {
    map(
        tuple((
            keyword("SELECT"),
            separated_list1(ws(char(',')), select_item),
            keyword("FROM"),
            ws(qualified_name),
            opt(where_clause),
            opt(group_by_clause),
        )),
        |(_, items, _, from, filter, group_by)| SelectStatement {
            items,
            from,
            filter,
            group_by: group_by.unwrap_or_default(),
        },
    )(input)
}

fn insert(input: &str) -> ParseResult<SqlStatement> {
    map(
        tuple((
            keyword("INSERT"),
            alt((value(false, keyword("INTO")), value(true, keyword("OVERWRITE")))),
            opt(keyword("TABLE")),
            ws(qualified_name),
            select,
        )),
        |(_, overwrite, _, target, query)| {
            SqlStatement::Insert(InsertStatement {
                target,
                overwrite,
                query,
            })
        },
    )(input)
}

fn show_tables(input: &str) -> ParseResult<SqlStatement> {
    value(SqlStatement::ShowTables, pair(keyword("SHOW"), keyword("TABLES")))(input)
}

fn statement(input: &str) -> ParseResult<SqlStatement> {
    all_consuming(terminated(
        alt((
            create_table,
            insert,
            map(select, SqlStatement::Select),
            show_tables,
        )),
        opt(ws(tag(";"))),
    ))(input)
}
