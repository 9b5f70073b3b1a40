// Example: a one-million-row list driven by an in-memory "scroll container".
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use virtual_lanes::{
    Align, OffsetCallback, OffsetChange, Rect, RectCallback, ScrollToFnOptions, ScrollToOptions,
    Unsubscribe, Virtualizer, VirtualizerOptions,
};

type V = Virtualizer<&'static str, ()>;

fn main() {
    // The host side: current offset and the registered offset listener.
    let offset = Rc::new(Cell::new(0.0));
    let listener: Rc<RefCell<Option<OffsetCallback>>> = Rc::new(RefCell::new(None));

    let options = VirtualizerOptions::new(
        1_000_000,
        |_| 24.0,
        || Some("list"),
        {
            let offset = Rc::clone(&offset);
            let listener = Rc::clone(&listener);
            move |to: f64, _: ScrollToFnOptions, _: &V| {
                offset.set(to);
                if let Some(notify) = listener.borrow().as_ref() {
                    notify(OffsetChange::new(to, false));
                }
            }
        },
        |_: &V, on_rect: RectCallback| {
            on_rect(Rect::new(640.0, 480.0));
            let unsubscribe: Unsubscribe = Box::new(|| println!("rect observer released"));
            Ok(unsubscribe)
        },
        {
            let offset = Rc::clone(&offset);
            let listener = Rc::clone(&listener);
            move |_: &V, on_offset: OffsetCallback| {
                on_offset(OffsetChange::new(offset.get(), false));
                *listener.borrow_mut() = Some(on_offset);
                let listener = Rc::clone(&listener);
                let unsubscribe: Unsubscribe = Box::new(move || {
                    listener.borrow_mut().take();
                    println!("offset observer released");
                });
                Ok(unsubscribe)
            }
        },
    )
    .with_overscan(2);

    let v = Virtualizer::new(options);
    if let Err(err) = v.did_mount() {
        eprintln!("mount failed: {err}");
        return;
    }

    let items = v.get_virtual_items();
    println!("total_size={}", v.get_total_size());
    println!("visible_range={:?}", v.visible_range());
    println!("rendered={} first={:?}", items.len(), items.first());

    let handle = v.scroll_to_index(999_999, ScrollToOptions::default().with_align(Align::End));
    println!(
        "after scroll_to_index: status={:?} offset={} range={:?}",
        handle.status(),
        v.scroll_offset(),
        v.visible_range()
    );

    v.unmount();
}
