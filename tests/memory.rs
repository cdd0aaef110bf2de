mod common;

use common::run_ok;
use pretty_assertions::assert_eq;

#[test]
fn test_dropping_long_instance_chain() {
    let output = run_ok(
        r#"
        class Node {}
        var head = nil;
        for (var i = 0; i < 200000; i = i + 1) {
            var n = Node();
            n.next = head;
            head = n;
        }
        head = nil;
        print "released";
        "#,
    );
    assert_eq!(output, "released\n");
}

#[test]
fn test_dropping_long_closure_chain() {
    let output = run_ok(
        r#"
        var latest = nil;
        for (var i = 0; i < 200000; i = i + 1) {
            var previous = latest;
            fun link() { return previous; }
            latest = link;
        }
        print latest() != nil;
        latest = nil;
        print "released";
        "#,
    );
    assert_eq!(output, "true\nreleased\n");
}

#[test]
fn test_cycles_inside_a_long_running_loop() {
    let output = run_ok(
        r#"
        class Pair {}
        var survivors = 0;
        for (var i = 0; i < 20000; i = i + 1) {
            var a = Pair();
            var b = Pair();
            a.other = b;
            b.other = a;
            if (a.other.other == a) survivors = survivors + 1;
        }
        print survivors;
        "#,
    );
    assert_eq!(output, "20000\n");
}
