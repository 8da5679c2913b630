// Tests for JavaScript text utilities
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of permlink.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

use super::*;

#[test]
fn output_mode_from_str() {
    assert_eq!(Ok(OutputMode::Obfuscated), "OBF".parse());
    assert_eq!(Ok(OutputMode::Obfuscated), "obfuscated".parse());
    assert_eq!(Ok(OutputMode::Pretty), "Pretty".parse());
    assert_eq!(Ok(OutputMode::Detailed), "detailed".parse());
    assert!("ugly".parse::<OutputMode>().is_err());
}

#[test]
fn output_mode_display_parses_back() {
    for mode in [OutputMode::Obfuscated, OutputMode::Pretty, OutputMode::Detailed]
    {
        assert_eq!(Ok(mode), mode.to_string().parse());
    }
}

#[test]
fn pretty_leaves_text_unchanged() {
    let js = "function f() {\n  // comment\n  return 1;\n}\n";

    assert_eq!(
        Ok(js.to_string()),
        StandardOptimizer.optimize(js, OutputMode::Pretty),
    );
    assert_eq!(
        Ok(js.to_string()),
        StandardOptimizer.optimize(js, OutputMode::Detailed),
    );
}

#[test]
fn obfuscated_strips_comments_and_indentation() {
    let js = "\
/* header
   comment */
function f() {
  // line comment
  var s = '// not a comment';

  return s; // trailing
}
";

    assert_eq!(
        Ok("function f() {\nvar s = '// not a comment';\nreturn s;\n}\n"
            .to_string()),
        StandardOptimizer.optimize(js, OutputMode::Obfuscated),
    );
}

#[test]
fn regex_literals_are_not_comments() {
    let js = "var r = /a\\/b[/]c/g; var d = x / 2 / y;";

    assert_eq!(
        Ok(format!("{}\n", js)),
        StandardOptimizer.optimize(js, OutputMode::Obfuscated),
    );
}

#[test]
fn regex_literal_after_keyword() {
    for kw in REGEX_KEYWORDS {
        let js = format!("function f(){{ {} /[(]/; }}", kw);

        assert_eq!(
            Ok(js.clone()),
            StandardOptimizer.optimize(&js, OutputMode::Pretty),
            "regex after `{}`",
            kw,
        );
    }
}

#[test]
fn provider_returning_regex_test() {
    let js = "function f(){ return /[(]/.test(navigator.userAgent) ? 'a' : 'b'; }";

    assert_eq!(
        Ok(js.to_string()),
        StandardOptimizer.optimize(js, OutputMode::Pretty),
    );
}

#[test]
fn division_after_identifier_resembling_keyword() {
    for js in ["var n = ofs / 2;", "var n = returned / 2;", "var n = typeofs / 2;"] {
        assert_eq!(
            Ok(format!("{}\n", js)),
            StandardOptimizer.optimize(js, OutputMode::Obfuscated),
        );
    }
}

#[test]
fn obfuscated_keeps_template_literal_whitespace() {
    assert_eq!(
        Ok("var s = `a\n    b`;\n".to_string()),
        StandardOptimizer.optimize("var s = `a\n    b`;\n", OutputMode::Obfuscated),
    );

    let js = "\
function f() {
  // greeting
  return `
    hello ${name}
  `;
}
";

    assert_eq!(
        Ok("function f() {\nreturn `\n    hello ${name}\n  `;\n}\n".to_string()),
        StandardOptimizer.optimize(js, OutputMode::Obfuscated),
    );
}

#[test]
fn unbalanced_brackets_rejected() {
    assert_eq!(
        Err(JsError::new(2, "unclosed `{`")),
        StandardOptimizer.optimize("\nfunction f() {\n", OutputMode::Pretty),
    );
    assert_eq!(
        Err(JsError::new(1, "unexpected `]`")),
        StandardOptimizer.optimize("f(]);", OutputMode::Pretty),
    );
}

#[test]
fn mismatched_close_reports_line() {
    let err = StandardOptimizer
        .optimize("f(\n1\n];", OutputMode::Pretty)
        .unwrap_err();

    assert_eq!(3, err.line);
    assert_eq!("unexpected `]`", err.message);
}

#[test]
fn unterminated_string_rejected() {
    let err = StandardOptimizer
        .optimize("var a = 'b;\nvar c;", OutputMode::Pretty)
        .unwrap_err();

    assert_eq!(JsError::new(1, "unterminated string literal"), err);
}

#[test]
fn template_literal_spans_lines() {
    let js = "var a = `x\ny`;\nf(\n";
    let err = StandardOptimizer.optimize(js, OutputMode::Pretty).unwrap_err();

    // The newline inside the template literal still counts.
    assert_eq!(JsError::new(3, "unclosed `(`"), err);
}

#[test]
fn unterminated_comment_rejected() {
    let err = StandardOptimizer
        .optimize("var a;\n/* open", OutputMode::Obfuscated)
        .unwrap_err();

    assert_eq!(JsError::new(2, "unterminated comment"), err);
}

#[test]
fn brackets_in_strings_ignored() {
    assert!(StandardOptimizer
        .optimize("var a = '{', b = \"(\";", OutputMode::Pretty)
        .is_ok());
}

#[test]
fn text_output_optional_newlines() {
    let mut pretty = TextOutput::new(false);
    pretty.print("a").newline_opt().print("b");
    assert_eq!("a\nb", pretty.into_string());

    let mut compact = TextOutput::new(true);
    compact.print("a").newline_opt().print("b");
    assert_eq!("ab", compact.into_string());
}

#[test]
fn string_literal_prefers_double_quotes() {
    assert_eq!(r#""it's""#, string_literal("it's"));
    assert_eq!(r#"'say "hi"'"#, string_literal(r#"say "hi""#));
    assert_eq!(r#""a\"'b""#, string_literal(r#"a"'b"#));
}

#[test]
fn string_literal_escapes() {
    assert_eq!(
        r#""a\\b\nc\td\x3C/script>\x01""#,
        string_literal("a\\b\nc\td</script>\u{1}"),
    );
    assert_eq!(r#""\u2028""#, string_literal("\u{2028}"));
}

#[test]
fn quoted_escapes_only_given_quote() {
    assert_eq!(r#"'it\'s "fine"'"#, quoted(r#"it's "fine""#, '\''));
    assert_eq!(r#""it's \"fine\"""#, quoted(r#"it's "fine""#, '"'));
    assert_eq!(r"'a\0b\r\x1F'", quoted("a\0b\r\u{1f}", '\''));
}
