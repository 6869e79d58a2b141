//! Source fixtures for tests.

pub const TWO_CLASSES: &str = "class Point {\n    var x;\n    var y;\n}\n\nclass Line {\n    var start;\n    var end;\n}\n";

pub const COMPACT_SHAPES: &str = "class Point { var x; var y; }\nclass Line { var start; var end; }\n";

pub const REFORMATTED_SHAPES: &str = r#"
// shapes, reindented
class Point {
        var x;
        var y;
}

class Line {
        var start;
        var end;
}
"#;

pub const FUNCTION_BODY: &str = "fn f() { let a = 1; let b = 2; }\n";

pub const FUNCTION_BODY_REFORMATTED: &str = "fn f() {\n    let a = 1;\n    let b = 2;\n}\n";

pub const WITH_IMPORTS: &str = "import geo.point;\nimport geo.line;\n\nclass Shape {}\n";

pub const TWO_LINES: &str = "class A {}\nclass B {}\n";
