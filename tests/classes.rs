mod common;

use common::{run_err, run_ok};
use pretty_assertions::assert_eq;

#[test]
fn test_class_and_instance_display() {
    let output = run_ok("class Bagel {} print Bagel; print Bagel();");
    assert_eq!(output, "Bagel\nBagel instance\n");
}

#[test]
fn test_fields() {
    let output = run_ok(
        r#"
        class Pair {}
        var pair = Pair();
        pair.first = 1;
        pair.second = 2;
        print pair.first + pair.second;
        "#,
    );
    assert_eq!(output, "3\n");
}

#[test]
fn test_methods_and_this() {
    let output = run_ok(
        r#"
        class Cake {
            taste() {
                var adjective = "delicious";
                print "The " + this.flavor + " cake is " + adjective + "!";
            }
        }
        var cake = Cake();
        cake.flavor = "German chocolate";
        cake.taste();
        "#,
    );
    assert_eq!(output, "The German chocolate cake is delicious!\n");
}

#[test]
fn test_initializer() {
    let output = run_ok(
        r#"
        class Point {
            init(x, y) {
                this.x = x;
                this.y = y;
            }
            sum() { return this.x + this.y; }
        }
        var p = Point(3, 4);
        print p.sum();
        print p.init(1, 1) == p;
        print p.sum();
        "#,
    );
    assert_eq!(output, "7\ntrue\n2\n");
}

#[test]
fn test_bound_method_display_and_call() {
    let output = run_ok(
        r#"
        class Greeter {
            init(name) { this.name = name; }
            greet() { print "hi " + this.name; }
        }
        var m = Greeter("ada").greet;
        print m;
        m();
        "#,
    );
    assert_eq!(output, "<fn greet>\nhi ada\n");
}

#[test]
fn test_field_shadows_method() {
    let output = run_ok(
        r#"
        class Box {
            value() { return "method"; }
        }
        fun replacement() { return "field"; }
        var b = Box();
        print b.value();
        b.value = replacement;
        print b.value();
        "#,
    );
    assert_eq!(output, "method\nfield\n");
}

#[test]
fn test_inheritance_and_override() {
    let output = run_ok(
        r#"
        class Animal {
            speak() { return "..."; }
            name() { return "animal"; }
        }
        class Dog < Animal {
            speak() { return "woof"; }
        }
        var d = Dog();
        print d.speak();
        print d.name();
        "#,
    );
    assert_eq!(output, "woof\nanimal\n");
}

#[test]
fn test_super_calls() {
    let output = run_ok(
        r#"
        class A {
            method() { print "A method"; }
            describe() { return "A"; }
        }
        class B < A {
            method() {
                print "B method";
                super.method();
            }
            describe() {
                var parent = super.describe;
                return parent() + "B";
            }
        }
        class C < B {}
        C().method();
        print C().describe();
        "#,
    );
    assert_eq!(output, "B method\nA method\nAB\n");
}

#[test]
fn test_super_initializer() {
    let output = run_ok(
        r#"
        class Base {
            init(a) { this.a = a; }
        }
        class Derived < Base {
            init(a, b) {
                super.init(a);
                this.b = b;
            }
        }
        var d = Derived(1, 2);
        print d.a + d.b;
        "#,
    );
    assert_eq!(output, "3\n");
}

#[test]
fn test_methods_copied_at_inherit_time() {
    // Methods added to the superclass later are not visible to the subclass.
    let output = run_ok(
        r#"
        class A { f() { return "a"; } }
        class B < A { }
        class A { f() { return "replaced"; } }
        print B().f();
        "#,
    );
    assert_eq!(output, "a\n");
}

#[test]
fn test_undefined_property() {
    let (_, err) = run_err("class A {} var a = A(); print a.missing;");
    assert!(err.to_string().contains("Undefined property 'missing'."));

    let (_, err) = run_err("class A {} A().missing();");
    assert!(err.to_string().contains("Undefined property 'missing'."));
}

#[test]
fn test_class_arity() {
    let (_, err) = run_err("class A {} A(1);");
    assert!(err.to_string().starts_with("Expected 0 arguments but got 1."));

    let (_, err) = run_err("class A { init(x) {} } A();");
    assert!(err.to_string().starts_with("Expected 1 arguments but got 0."));
}

#[test]
fn test_self_referencing_instances_are_fine_to_drop() {
    let output = run_ok(
        r#"
        class Node {}
        var n = Node();
        n.next = n;
        print n.next.next == n;
        "#,
    );
    assert_eq!(output, "true\n");
}
